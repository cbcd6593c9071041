//! The rule engine: one tick over every collection in the store.
//!
//! For each item that carries rules, every rule is evaluated against the
//! item as it stood before the tick, and only then are the results written
//! back. A rule therefore never sees a sibling field's new value from the
//! same tick. After the writes the item's timestamp is refreshed.
//!
//! Nothing a single field does can abort a tick. Fields whose target does
//! not resolve, whose rule kind is unknown, or whose value has the wrong
//! shape are skipped; each skip is logged at `debug` and counted in the
//! returned [`TickReport`].

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Number, Value};
use simfeed_types::{
    ChoiceRule, CollectionKind, FloatRule, GeoMovementRule, IncidentRule, IntRule, Rule,
};
use tracing::debug;

use crate::clock::{UpdateClock, format_timestamp};
use crate::config::GlobalConfig;
use crate::constraint::{clamp_float, clamp_int};
use crate::draw::uniform;
use crate::geo::GeoMotionModel;
use crate::incidents;
use crate::store::{FieldRule, Item, Store};

/// Geometry type that `geo_movement` accepts.
const POINT: &str = "Point";

/// Why a field was left alone on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// The rule's target path does not exist in the item.
    #[error("target path did not resolve")]
    PathResolutionMiss,

    /// The rule kind is not one the engine knows.
    #[error("unknown rule type")]
    UnknownRuleType,

    /// The target exists but has the wrong shape for the rule.
    #[error("invalid rule target: {0}")]
    InvalidRuleTarget(&'static str),
}

/// Counters describing one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Items that carried at least one rule.
    pub items_visited: u64,
    /// Fields that received a new value.
    pub fields_updated: u64,
    /// Fields whose rule ran but chose to leave the value as it was.
    pub fields_unchanged: u64,
    /// Fields skipped because their path did not resolve.
    pub skipped_unresolved: u64,
    /// Fields skipped because their rule kind is unknown.
    pub skipped_unknown: u64,
    /// Fields skipped because the target had the wrong shape.
    pub skipped_invalid: u64,
}

impl TickReport {
    /// Empty report for `tick`.
    pub const fn new(tick: u64) -> Self {
        Self {
            tick,
            items_visited: 0,
            fields_updated: 0,
            fields_unchanged: 0,
            skipped_unresolved: 0,
            skipped_unknown: 0,
            skipped_invalid: 0,
        }
    }

    /// Total skipped fields across all reasons.
    pub const fn skipped(&self) -> u64 {
        self.skipped_unresolved
            .saturating_add(self.skipped_unknown)
            .saturating_add(self.skipped_invalid)
    }

    const fn record_skip(&mut self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::PathResolutionMiss => &mut self.skipped_unresolved,
            SkipReason::UnknownRuleType => &mut self.skipped_unknown,
            SkipReason::InvalidRuleTarget(_) => &mut self.skipped_invalid,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Applies item rules to a store, one tick at a time.
#[derive(Debug)]
pub struct RuleEngine<R = StdRng> {
    rng: R,
    geo: GeoMotionModel,
    clock: UpdateClock,
}

impl RuleEngine<StdRng> {
    /// Engine seeded from `config.seed`, or from OS entropy when unset.
    pub fn from_config(config: &GlobalConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self::new(rng, config.update_interval_secs())
    }
}

impl<R: Rng> RuleEngine<R> {
    /// Engine drawing from `rng`, moving points as if ticks were
    /// `update_interval_secs` apart.
    pub fn new(rng: R, update_interval_secs: f64) -> Self {
        Self {
            rng,
            geo: GeoMotionModel::new(update_interval_secs),
            clock: UpdateClock::new(),
        }
    }

    /// Run one tick over `store`, mutating it in place.
    pub fn tick(&mut self, store: &mut Store) -> TickReport {
        let tick = store.advance_tick();
        let now = self.clock.now();
        let stamp = format_timestamp(now);
        let mut report = TickReport::new(tick);

        for (name, collection) in store.collections_mut() {
            let kind = collection.kind;
            for item in collection.items.iter_mut().filter(|item| item.has_rules()) {
                report.items_visited = report.items_visited.saturating_add(1);

                let mut writes = Vec::new();
                for field in item.rules() {
                    match self.evaluate(kind, item, field, now) {
                        Ok(Some(value)) => writes.push((field.path.clone(), value)),
                        Ok(None) => {
                            report.fields_unchanged = report.fields_unchanged.saturating_add(1);
                        }
                        Err(reason) => {
                            debug!(
                                tick,
                                collection = name,
                                field = %field.path,
                                rule = field.rule.kind_name(),
                                %reason,
                                "Field skipped"
                            );
                            report.record_skip(reason);
                        }
                    }
                }

                for (path, value) in writes {
                    match item.write(kind, &path, value) {
                        Ok(()) => report.fields_updated = report.fields_updated.saturating_add(1),
                        Err(e) => {
                            debug!(tick, collection = name, field = %path, error = %e, "Field write failed");
                            report.record_skip(SkipReason::InvalidRuleTarget("path is not writable"));
                        }
                    }
                }

                item.touch(kind, &stamp);
            }
        }

        debug!(
            tick,
            items = report.items_visited,
            updated = report.fields_updated,
            skipped = report.skipped(),
            "Tick applied"
        );
        report
    }

    /// Compute a field's next value from the pre-tick item.
    ///
    /// `Ok(None)` means the rule ran and keeps the current value.
    fn evaluate(
        &mut self,
        kind: CollectionKind,
        item: &Item,
        field: &FieldRule,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Value>, SkipReason> {
        if matches!(field.rule, Rule::Unknown) {
            return Err(SkipReason::UnknownRuleType);
        }
        let current = item
            .read(kind, &field.path)
            .ok_or(SkipReason::PathResolutionMiss)?;

        match &field.rule {
            Rule::RandomFloat(params) => self.random_float(current, params).map(Some),
            Rule::RandomInt(params) => self.random_int(current, params).map(Some),
            Rule::RandomChoice(params) => Ok(self.random_choice(params)),
            Rule::GeoMovement(params) => {
                if item.owner_type(kind, &field.path) != Some(POINT) {
                    return Err(SkipReason::InvalidRuleTarget("geometry is not a Point"));
                }
                self.geo_movement(current, params).map(Some)
            }
            Rule::RandomIncidents(params) => self.random_incidents(current, params, now),
            Rule::Unknown => Err(SkipReason::UnknownRuleType),
        }
    }

    fn random_float(&mut self, current: &Value, params: &FloatRule) -> Result<Value, SkipReason> {
        let value = current
            .as_f64()
            .ok_or(SkipReason::InvalidRuleTarget("value is not a number"))?;
        let (min_change, max_change) = params.change_range();
        let (min_value, max_value) = params.value_bounds();
        let next = clamp_float(
            value + uniform(&mut self.rng, min_change, max_change),
            min_value,
            max_value,
            params.precision(),
        );
        finite_number(next)
    }

    fn random_int(&mut self, current: &Value, params: &IntRule) -> Result<Value, SkipReason> {
        let (min_change, max_change) = params.change_range();
        let (min_value, max_value) = params.value_bounds();
        let delta = self.rng.random_range(min_change..=max_change);

        let next = if let Some(value) = current.as_i64() {
            value.saturating_add(delta).clamp(min_value, max_value)
        } else {
            let value = current
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or(SkipReason::InvalidRuleTarget("value is not a number"))?;
            #[allow(clippy::cast_precision_loss)]
            let moved = value + delta as f64;
            clamp_int(moved, min_value, max_value)
        };
        Ok(Value::from(next))
    }

    fn random_choice(&mut self, params: &ChoiceRule) -> Option<Value> {
        params.choices.choose(&mut self.rng).cloned()
    }

    fn geo_movement(&mut self, current: &Value, params: &GeoMovementRule) -> Result<Value, SkipReason> {
        const NOT_A_PAIR: SkipReason = SkipReason::InvalidRuleTarget("coordinates are not a [lon, lat] pair");

        let position = match current.as_array().map(Vec::as_slice) {
            Some([lon, lat]) => [
                lon.as_f64().ok_or(NOT_A_PAIR)?,
                lat.as_f64().ok_or(NOT_A_PAIR)?,
            ],
            _ => return Err(NOT_A_PAIR),
        };
        let [lon, lat] = self.geo.advance(position, params, &mut self.rng);
        Ok(Value::Array(vec![finite_number(lon)?, finite_number(lat)?]))
    }

    fn random_incidents(
        &mut self,
        current: &Value,
        params: &IncidentRule,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Value>, SkipReason> {
        let list: &[Value] = match current {
            Value::Array(entries) if entries.iter().all(Value::is_object) => entries,
            Value::Null => &[],
            _ => {
                return Err(SkipReason::InvalidRuleTarget(
                    "value is not a list of incident objects",
                ));
            }
        };
        Ok(incidents::maybe_add(list, params, now, &mut self.rng).map(Value::Array))
    }
}

fn finite_number(value: f64) -> Result<Value, SkipReason> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(SkipReason::InvalidRuleTarget("result is not finite"))
}
