//! Attribute store shared by tables and columns.
//!
//! Keys wrapped in double underscores (`__name__`) are internal: they are
//! stored and persisted like any other key but skipped by user-visible
//! iteration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// Returns true for internal `__name__` keys.
pub fn is_reserved(key: &str) -> bool {
    key.len() > 4 && key.starts_with("__") && key.ends_with("__")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(AttrValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    /// User-visible entries only.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge every entry of `other` (internal keys included) into self.
    pub fn update(&mut self, other: &Attributes) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// User-visible entries rendered as strings, as stored in the index.
    pub fn stringified(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_hidden() {
        let mut attrs = Attributes::new();
        attrs.set("unit", "s");
        attrs.set("__basis_name__", "time");

        let visible: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(visible, vec!["unit"]);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get_text("__basis_name__"), Some("time"));
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("__name__"));
        assert!(!is_reserved("____"));
        assert!(!is_reserved("__name"));
        assert!(!is_reserved("name"));
    }

    #[test]
    fn test_update_and_stringify() {
        let mut a: Attributes = [("unit", "s")].into_iter().collect();
        let mut b = Attributes::new();
        b.set("scale", 2.5);
        b.set("unit", "ms");
        a.update(&b);

        let s = a.stringified();
        assert_eq!(s.get("unit").map(String::as_str), Some("ms"));
        assert_eq!(s.get("scale").map(String::as_str), Some("2.5"));
    }
}
