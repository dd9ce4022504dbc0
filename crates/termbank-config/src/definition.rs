//! Declarative resource definitions.
//!
//! A [`ResourceDefinition`] is a flat, ordered set of named property values.
//! Two keys are reserved and interpreted by the builder itself: [`CLASS_KEY`]
//! names the factory to instantiate, and [`IGNORE_ERRORS_KEY`] selects the
//! failure policy. Everything else is forwarded, in declaration order, to the
//! constructed object.
//!
//! ## TOML Example
//!
//! ```toml
//! [resources.synonyms_db]
//! class = "sqlite"
//! ignoreErrors = false
//! path = "/var/lib/termbank/synonyms.db"
//! busyTimeout = 2000
//! ```

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved key holding the class identifier.
pub const CLASS_KEY: &str = "class";

/// Reserved key holding the ignore-errors flag.
pub const IGNORE_ERRORS_KEY: &str = "ignoreErrors";

/// A single property value: string, integer, float, or boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
        }
    }

    /// The value rendered as text. Strings are borrowed, everything else is
    /// formatted.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            PropertyValue::String(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Interpret as a boolean. Accepts `true`/`false` and their string forms.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interpret as a signed integer. String values are parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a float. Integers widen, string values are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether this is an explicit `false` (boolean or the exact string).
    pub fn is_false(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => !b,
            PropertyValue::String(s) => s == "false",
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

/// An ordered, flat property set describing one resource.
///
/// Consumed by value: the builder removes reserved keys as it interprets them
/// and drains the remaining properties into the target object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDefinition {
    properties: IndexMap<String, PropertyValue>,
}

impl ResourceDefinition {
    /// Create an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a definition with the given class identifier.
    pub fn with_class(class: impl Into<String>) -> Self {
        Self::new().with(CLASS_KEY, class.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a property, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get a property by key.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The class identifier, without consuming it.
    pub fn class(&self) -> Option<&PropertyValue> {
        self.properties.get(CLASS_KEY)
    }

    /// Remove and return a property, preserving the order of the rest.
    pub fn take(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.shift_remove(key)
    }

    /// Remove and return the class identifier.
    pub fn take_class(&mut self) -> Option<PropertyValue> {
        self.take(CLASS_KEY)
    }

    /// Remove the ignore-errors flag and return the effective policy.
    ///
    /// Errors are ignored unless the flag is an explicit `false`.
    pub fn take_ignore_errors(&mut self) -> bool {
        !self.take(IGNORE_ERRORS_KEY).is_some_and(|v| v.is_false())
    }

    /// Number of properties, reserved keys included.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the definition has no properties at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Consume the definition, yielding its properties in declaration order.
    pub fn into_properties(self) -> IndexMap<String, PropertyValue> {
        self.properties
    }
}

impl<K, V> FromIterator<(K, V)> for ResourceDefinition
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_take_preserves_order() {
        let mut def = ResourceDefinition::with_class("sqlite")
            .with("path", "a.db")
            .with("readOnly", true)
            .with("busyTimeout", 10i64);

        assert_eq!(def.take_class(), Some(PropertyValue::from("sqlite")));
        let keys: Vec<&str> = def.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["path", "readOnly", "busyTimeout"]);
    }

    #[test]
    fn test_ignore_errors_defaults_to_true() {
        let mut def = ResourceDefinition::with_class("x");
        assert!(def.take_ignore_errors());

        let mut def = ResourceDefinition::with_class("x").with(IGNORE_ERRORS_KEY, "yes");
        assert!(def.take_ignore_errors());
        assert!(def.get(IGNORE_ERRORS_KEY).is_none());
    }

    #[test]
    fn test_ignore_errors_explicit_false() {
        let mut def = ResourceDefinition::with_class("x").with(IGNORE_ERRORS_KEY, false);
        assert!(!def.take_ignore_errors());

        let mut def = ResourceDefinition::with_class("x").with(IGNORE_ERRORS_KEY, "false");
        assert!(!def.take_ignore_errors());
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(PropertyValue::from("100").as_i64(), Some(100));
        assert_eq!(PropertyValue::from(3i64).as_f64(), Some(3.0));
        assert_eq!(PropertyValue::from("true").as_bool(), Some(true));
        assert_eq!(PropertyValue::from(1i64).as_bool(), None);
        assert_eq!(PropertyValue::from(2.5).as_text(), "2.5");
    }

    #[test]
    fn test_deserialize_untagged_values() {
        let def: ResourceDefinition = toml::from_str(
            r#"
                class = "sqlite"
                flag = true
                count = 7
                ratio = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(def.get("flag"), Some(&PropertyValue::Bool(true)));
        assert_eq!(def.get("count"), Some(&PropertyValue::Integer(7)));
        assert_eq!(def.get("ratio"), Some(&PropertyValue::Float(0.5)));
        assert_eq!(def.get("class"), Some(&PropertyValue::from("sqlite")));
    }
}
