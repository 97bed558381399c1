//! Path writes into the output document.
//!
//! The document is a `serde_json::Value` object with insertion-ordered maps.
//! Paths are `.`-separated; a segment may carry one `[index]` suffix:
//!
//! ```text
//! set_path(doc, "$.trackTemplate.sections[2].rows", 4)
//!
//! { "trackTemplate": { "sections": [ {}, {}, { "rows": 4 } ] } }
//! ```
//!
//! ## Invariants
//!
//! - Missing intermediate segments are created: maps for plain segments,
//!   lists (padded with empty maps) for indexed ones.
//! - A non-container in the way is replaced silently.
//! - The final write always overwrites (last write wins).
//! - No path ever fails; odd paths just produce odd structure.

use serde_json::{Map, Value};

/// Optional leading root markers, stripped before splitting.
const ROOT_MARKERS: &[&str] = &["$.", "$"];

/// Indexes above this are treated as part of the key instead of padding a
/// list to that length.
const MAX_INDEX: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
struct Segment<'p> {
    key: &'p str,
    index: Option<usize>,
}

fn segments(path: &str) -> Vec<Segment<'_>> {
    let path = ROOT_MARKERS.iter().find_map(|marker| path.strip_prefix(marker)).unwrap_or(path);
    path.split('.').filter(|s| !s.is_empty()).map(parse_segment).collect()
}

fn parse_segment(raw: &str) -> Segment<'_> {
    if let Some(open) = raw.find('[') {
        if let Some(inner) = raw[open + 1..].strip_suffix(']') {
            if let Ok(index) = inner.trim().parse::<usize>() {
                if index <= MAX_INDEX {
                    return Segment { key: &raw[..open], index: Some(index) };
                }
            }
        }
    }
    Segment { key: raw, index: None }
}

fn empty_map() -> Value {
    Value::Object(Map::new())
}

fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = empty_map();
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn as_list(node: &mut Value) -> &mut Vec<Value> {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    match node {
        Value::Array(list) => list,
        _ => unreachable!("node was just replaced with an array"),
    }
}

/// The list at `key` in `node`, padded with empty maps through `index`.
fn padded_list<'d>(node: &'d mut Value, key: &str, index: usize) -> &'d mut Vec<Value> {
    let list = as_list(as_object(node).entry(key).or_insert_with(|| Value::Array(Vec::new())));
    while list.len() <= index {
        list.push(empty_map());
    }
    list
}

/// Step into `segment`, creating or replacing containers on the way.
fn descend<'d>(node: &'d mut Value, segment: &Segment<'_>) -> &'d mut Value {
    let slot = match segment.index {
        None => as_object(node).entry(segment.key).or_insert_with(empty_map),
        Some(index) => &mut padded_list(node, segment.key, index)[index],
    };
    if !slot.is_object() {
        *slot = empty_map();
    }
    slot
}

/// Walk every segment but the last, returning the parent and the last segment.
fn walk<'d, 'p>(doc: &'d mut Value, path: &'p str) -> Option<(&'d mut Value, Segment<'p>)> {
    let mut segments = segments(path);
    let last = segments.pop()?;
    let mut node = doc;
    for segment in &segments {
        node = descend(node, segment);
    }
    Some((node, last))
}

/// Write `value` at `path`, creating whatever is missing.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let Some((parent, last)) = walk(doc, path) else {
        tracing::debug!(path, "empty path ignored");
        return;
    };
    match last.index {
        None => {
            as_object(parent).insert(last.key.to_string(), value);
        }
        Some(index) => padded_list(parent, last.key, index)[index] = value,
    }
}

/// Append `value` to the list at `path`, creating it if needed. An index on
/// the final segment is ignored.
pub fn push_path(doc: &mut Value, path: &str, value: Value) {
    let Some((parent, last)) = walk(doc, path) else {
        tracing::debug!(path, "empty path ignored");
        return;
    };
    as_list(as_object(parent).entry(last.key).or_insert_with(|| Value::Array(Vec::new()))).push(value);
}

/// Read the value at `path`, if every segment exists.
pub fn get_path<'d>(doc: &'d Value, path: &str) -> Option<&'d Value> {
    let mut node = doc;
    for segment in segments(path) {
        node = node.as_object()?.get(segment.key)?;
        if let Some(index) = segment.index {
            node = node.as_array()?.get(index)?;
        }
    }
    Some(node)
}
