//! Wall-clock source for item timestamps.
//!
//! Every item carries the time it was last rewritten. The clock hands out
//! UTC instants that never go backwards, even if the system clock is
//! adjusted between ticks, so consumers can order updates by timestamp.

use chrono::{DateTime, SecondsFormat, Utc};

/// Monotonic source of update timestamps.
#[derive(Debug, Clone, Default)]
pub struct UpdateClock {
    /// The most recent instant handed out.
    last: Option<DateTime<Utc>>,
}

impl UpdateClock {
    /// Create a clock that has not yet produced a timestamp.
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// The current instant, never earlier than any previous call.
    pub fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamped = self.last.map_or(now, |last| last.max(now));
        self.last = Some(stamped);
        stamped
    }

    /// The last instant handed out, if any.
    pub const fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

/// Render an instant the way timestamps are stored in items.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_never_go_backwards() {
        let mut clock = UpdateClock::new();
        assert!(clock.last().is_none());
        let mut previous = clock.now();
        for _ in 0..100 {
            let next = clock.now();
            assert!(next >= previous);
            previous = next;
        }
        assert_eq!(clock.last(), Some(previous));
    }

    #[test]
    fn format_is_rfc3339_with_micros() {
        let instant = DateTime::parse_from_rfc3339("2024-05-01T12:30:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(instant), "2024-05-01T12:30:00.500000Z");
    }
}
