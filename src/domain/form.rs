//! Assembly of a JSON object from flat form fields.
//!
//! Field names use bracket notation to describe nesting:
//!
//! - `customer[name]` stores into an object under `customer`
//! - `items[0][sku]` stores into the first element of the `items` array
//! - `tags[]` appends to the `tags` array
//!
//! Repeating a name without brackets collects the values into an array.

use serde_json::{Map, Value};

use super::error::DomainError;

/// Highest array index a field name may address.
pub const MAX_ARRAY_INDEX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Push,
}

/// Accumulates form fields into a single JSON object.
#[derive(Debug, Clone)]
pub struct FormData {
    root: Value,
}

impl Default for FormData {
    fn default() -> Self {
        Self::new()
    }
}

impl FormData {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Store `value` at the location described by `name`.
    pub fn append(&mut self, name: &str, value: Value) -> Result<(), DomainError> {
        let path = parse_name(name)?;
        place(&mut self.root, &path, value, name)
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

fn parse_name(name: &str) -> Result<Vec<Segment>, DomainError> {
    let (head, mut rest) = match name.find('[') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    };

    if head.is_empty() {
        return Err(DomainError::validation(format!(
            "field name `{name}` has no leading key"
        )));
    }

    let mut path = vec![Segment::Key(head.to_string())];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return Err(DomainError::validation(format!(
                "field name `{name}` has text after a closing bracket"
            )));
        };
        let Some(close) = inner.find(']') else {
            return Err(DomainError::validation(format!(
                "field name `{name}` has an unclosed bracket"
            )));
        };

        let segment = &inner[..close];
        if segment.contains('[') {
            return Err(DomainError::validation(format!(
                "field name `{name}` has a nested bracket"
            )));
        }
        path.push(classify(segment, name)?);
        rest = &inner[close + 1..];
    }

    Ok(path)
}

fn classify(segment: &str, name: &str) -> Result<Segment, DomainError> {
    if segment.is_empty() {
        return Ok(Segment::Push);
    }
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        let index: usize = segment.parse().map_err(|_| {
            DomainError::validation(format!("field name `{name}` has an invalid index"))
        })?;
        if index > MAX_ARRAY_INDEX {
            return Err(DomainError::validation(format!(
                "field name `{name}` addresses index {index}, above the limit of {MAX_ARRAY_INDEX}"
            )));
        }
        return Ok(Segment::Index(index));
    }
    Ok(Segment::Key(segment.to_string()))
}

fn place(slot: &mut Value, path: &[Segment], value: Value, name: &str) -> Result<(), DomainError> {
    let Some((segment, rest)) = path.split_first() else {
        return merge_leaf(slot, value, name);
    };

    match segment {
        Segment::Key(key) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(map) = slot else {
                return Err(conflict(name));
            };
            let child = map.entry(key.clone()).or_insert(Value::Null);
            place(child, rest, value, name)
        }
        Segment::Index(index) => {
            let items = array_slot(slot, name)?;
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            place(&mut items[*index], rest, value, name)
        }
        Segment::Push => {
            let items = array_slot(slot, name)?;
            items.push(Value::Null);
            let last = items.len() - 1;
            place(&mut items[last], rest, value, name)
        }
    }
}

fn array_slot<'a>(slot: &'a mut Value, name: &str) -> Result<&'a mut Vec<Value>, DomainError> {
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        _ => Err(conflict(name)),
    }
}

fn merge_leaf(slot: &mut Value, value: Value, name: &str) -> Result<(), DomainError> {
    match slot {
        Value::Null => *slot = value,
        Value::Array(items) => items.push(value),
        Value::Object(_) => return Err(conflict(name)),
        _ => {
            let previous = slot.take();
            *slot = Value::Array(vec![previous, value]);
        }
    }
    Ok(())
}

fn conflict(name: &str) -> DomainError {
    DomainError::validation(format!(
        "field `{name}` conflicts with the shape of an earlier field"
    ))
}
