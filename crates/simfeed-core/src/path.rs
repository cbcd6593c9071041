//! Dot-path addressing into nested item structures.
//!
//! A path such as `geometry.coordinates.0` is split on `.`; each segment
//! selects a key of a mapping or, when it is all ASCII digits, an index of a
//! sequence.
//!
//! - [`get`] never fails: a segment that does not resolve yields `None`.
//! - [`set`] synthesizes whatever containers are missing along the way. A
//!   sequence is created when the following segment is an index, a mapping
//!   otherwise, and sequences are padded with empty mappings up to the
//!   target index.

use serde_json::{Map, Value};

/// Errors raised when a path cannot be written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path has no segments.
    #[error("empty path")]
    Empty,

    /// A sequence was addressed with a segment that is not an index.
    #[error("segment `{segment}` of `{path}` addresses a sequence but is not an index")]
    NotAnIndex {
        /// The offending segment.
        segment: String,
        /// The full path being written.
        path: String,
    },
}

/// Resolve `path` against an item, returning `None` when any segment misses.
pub fn get<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = descend(current, segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate containers as needed.
///
/// A scalar sitting where a container is required is replaced by the
/// synthesized container.
pub fn set(root: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(PathError::Empty);
    };
    let Some((first, rest)) = parents.split_first() else {
        root.insert((*last).to_owned(), value);
        return Ok(());
    };

    let mut current = root.entry((*first).to_owned()).or_insert(Value::Null);
    prepare(current, rest.first().unwrap_or(last));
    for (i, segment) in rest.iter().enumerate() {
        let next = rest.get(i.saturating_add(1)).unwrap_or(last);
        current = child_slot(current, segment, path)?;
        prepare(current, next);
    }
    place(current, last, value, path)
}

/// The path of the container holding the addressed value, if any.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(head, _)| head)
}

/// Whether a segment addresses a sequence index.
pub fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn descend<'a>(container: &'a Value, segment: &str) -> Option<&'a Value> {
    match container {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => as_index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Ensure `slot` is a container able to hold `next`.
fn prepare(slot: &mut Value, next: &str) {
    if slot.is_object() || slot.is_array() {
        return;
    }
    *slot = if as_index(next).is_some() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    };
}

/// Pad a sequence with empty mappings until `index` is addressable.
fn pad(items: &mut Vec<Value>, index: usize) {
    while items.len() <= index {
        items.push(Value::Object(Map::new()));
    }
}

fn child_slot<'a>(
    container: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, PathError> {
    match container {
        Value::Array(items) => {
            let index = as_index(segment).ok_or_else(|| not_an_index(segment, path))?;
            pad(items, index);
            items
                .get_mut(index)
                .ok_or_else(|| not_an_index(segment, path))
        }
        Value::Object(map) => Ok(map.entry(segment.to_owned()).or_insert(Value::Null)),
        // `prepare` always runs first, so scalars never reach here; treat one
        // like an empty mapping all the same.
        other => {
            *other = Value::Object(Map::new());
            match other {
                Value::Object(map) => Ok(map.entry(segment.to_owned()).or_insert(Value::Null)),
                _ => Err(not_an_index(segment, path)),
            }
        }
    }
}

fn place(container: &mut Value, segment: &str, value: Value, path: &str) -> Result<(), PathError> {
    match container {
        Value::Array(items) => {
            let index = as_index(segment).ok_or_else(|| not_an_index(segment, path))?;
            pad(items, index);
            if let Some(slot) = items.get_mut(index) {
                *slot = value;
            }
            Ok(())
        }
        Value::Object(map) => {
            map.insert(segment.to_owned(), value);
            Ok(())
        }
        other => {
            let mut map = Map::new();
            map.insert(segment.to_owned(), value);
            *other = Value::Object(map);
            Ok(())
        }
    }
}

fn not_an_index(segment: &str, path: &str) -> PathError {
    PathError::NotAnIndex {
        segment: segment.to_owned(),
        path: path.to_owned(),
    }
}
