//! Runtime values.
//!
//! Values are immutable carriers. Mutation happens by replacing the value
//! held in a member overload or a dictionary entry. Nil is `Option::None`.

use serde::{Deserialize, Serialize};

use crate::composite::CompositeId;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitiveType", content = "primitiveValue", rename_all = "camelCase")]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Dictionary(Dictionary),
    Type(Type),
    /// Reference with pass-by-reference intent.
    Pointer(CompositeId),
    Reference(CompositeId),
}

/// Ordered key/value entries. Arrays are dictionaries keyed `0..n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    entries: Vec<(Value, Option<Value>)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn array(values: impl IntoIterator<Item = Option<Value>>) -> Self {
        Self {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(index, value)| (Value::Integer(index as i64), value))
                .collect(),
        }
    }

    /// Inserts or replaces the entry with an equal key.
    pub fn insert(&mut self, key: Value, value: Option<Value>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Removes the entry with an equal key, returning whether one existed.
    pub fn remove(&mut self, key: &Value) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, Option<&Value>)> {
        self.entries.iter().map(|(key, value)| (key, value.as_ref()))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter_map(|(_, value)| value.as_ref())
    }
}

impl Value {
    pub fn primitive_type(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Dictionary(_) => "dictionary",
            Value::Type(_) => "type",
            Value::Pointer(_) => "pointer",
            Value::Reference(_) => "reference",
        }
    }

    /// Composite directly addressed by a pointer or reference.
    pub fn composite(&self) -> Option<CompositeId> {
        match self {
            Value::Pointer(id) | Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Every composite the value holds, including dictionary contents.
    pub fn collect_composites(&self, out: &mut Vec<CompositeId>) {
        match self {
            Value::Pointer(id) | Value::Reference(id) => out.push(*id),
            Value::Dictionary(dictionary) => {
                for (key, value) in dictionary.iter() {
                    key.collect_composites(out);
                    if let Some(value) = value {
                        value.collect_composites(out);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn holds(&self, id: CompositeId) -> bool {
        let mut composites = Vec::new();
        self.collect_composites(&mut composites);
        composites.contains(&id)
    }
}

/// Truthiness of an optional value: booleans by value, everything else by presence.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Boolean(value)) => *value,
        Some(_) => true,
        None => false,
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Dictionary(dictionary) => {
                f.write_str("[")?;
                for (index, (key, value)) in dictionary.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    match value {
                        Some(value) => write!(f, "{key}: {value}")?,
                        None => write!(f, "{key}: nil")?,
                    }
                }
                f.write_str("]")
            }
            Value::Type(_) => f.write_str("<type>"),
            Value::Pointer(id) => write!(f, "&#{}", id.index),
            Value::Reference(id) => write!(f, "#{}", id.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_replaces_equal_keys() {
        let mut dictionary = Dictionary::new();
        dictionary.insert(Value::String("a".into()), Some(Value::Integer(1)));
        dictionary.insert(Value::String("a".into()), Some(Value::Integer(2)));

        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary.get(&Value::String("a".into())), Some(&Value::Integer(2)));
    }

    #[test]
    fn nested_composites_are_collected() {
        let id = CompositeId { index: 3, generation: 0 };
        let value = Value::Dictionary(Dictionary::array([
            Some(Value::Integer(1)),
            Some(Value::Reference(id)),
            None,
        ]));

        assert!(value.holds(id));
        assert_eq!(value.composite(), None);
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Boolean(false))));
        assert!(is_truthy(Some(&Value::Integer(0))));
    }

    #[test]
    fn arrays_display_with_indices() {
        let value = Value::Dictionary(Dictionary::array([Some(Value::Integer(4)), None]));
        assert_eq!(value.to_string(), "[0: 4, 1: nil]");
    }
}
