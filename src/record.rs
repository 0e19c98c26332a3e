//! The structured log record rewrite rules operate on.
//!
//! A [`Record`] is an ordered mapping from field name to text. Field order is
//! insertion order: overwriting a field keeps its position, creating one
//! appends it. Every enumeration of a record (and therefore every selector
//! match) follows that order.

use indexmap::map::Iter;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a field, creating it if absent.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            inner: self.fields.iter(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Take exclusive ownership of a possibly shared record.
    ///
    /// No copy is made when `shared` is the last handle; otherwise the caller
    /// gets a private copy and the shared original stays untouched.
    pub fn checkout(shared: Arc<Record>) -> Record {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone())
    }

    /// Build a record from a JSON object.
    ///
    /// Nested data is flattened into dot-notation keys:
    /// - `{"user": {"name": "Alice"}}` → `user.name = "Alice"`
    /// - `{"items": ["a", "b"]}` → `items.0 = "a"`, `items.1 = "b"`
    ///
    /// Strings are taken verbatim, `null` becomes empty text, other scalars
    /// use their JSON text. Two paths flattening to the same key (`"a.b"`
    /// next to `{"a": {"b": ..}}`) are rejected rather than merged.
    pub fn from_json(data: &Value) -> Result<Record, String> {
        match data {
            Value::Object(obj) => {
                let mut record = Record::new();
                for (key, val) in obj {
                    flatten_into(val, key.clone(), &mut record)?;
                }
                Ok(record)
            }
            other => Err(format!("expected a JSON object, found {}", json_kind(other))),
        }
    }

    /// Flat JSON object of string values, in field order.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

fn flatten_into(value: &Value, prefix: String, record: &mut Record) -> Result<(), String> {
    match value {
        Value::Object(obj) if !obj.is_empty() => {
            for (key, val) in obj {
                flatten_into(val, format!("{}.{}", prefix, key), record)?;
            }
            return Ok(());
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (index, val) in arr.iter().enumerate() {
                flatten_into(val, format!("{}.{}", prefix, index), record)?;
            }
            return Ok(());
        }
        _ => {}
    }

    if record.contains(&prefix) {
        return Err(format!("duplicate field '{}' after flattening", prefix));
    }
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        // Numbers, booleans and empty containers keep their JSON text
        other => other.to_string(),
    };
    record.set(prefix, text);
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Iterator over `(name, value)` pairs in field order.
pub struct RecordIter<'a> {
    inner: Iter<'a, String, String>,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a str, &'a str);
    type IntoIter = RecordIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}
