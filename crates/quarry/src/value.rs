use crate::entity::RelationHandle;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// Value
///
/// Runtime value model shared by expressions, plans, and result rows.
///
/// `Null`     → SQL NULL (an absent column value, not an error).
/// `Entity`   → a whole-entity slot in a result row: the entity's field
///              values in declaration order. Unmatched left-join slots
///              arrive as `Null` instead.
/// `Relation` → an unresolved relationship edge; resolving it is the
///              session's business.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Entity(Vec<Value>),
    Relation(RelationHandle),
}

impl Value {
    /// Build a list value from any value-convertible iterator.
    pub fn list<V: Into<Self>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Stable lowercase tag for diagnostics and projection errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Entity(_) => "entity",
            Self::Relation(_) => "relation",
        }
    }

    /// Numeric view of this value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical comparison between two values.
    ///
    /// `Int` and `Float` compare numerically across kinds. `Null` compares
    /// with nothing, including another `Null`; predicate evaluation treats
    /// an incomparable pair as "no match", never as an error.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (a, b) => {
                let (a, b) = (a.as_f64()?, b.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_kinds_compare_across_int_and_float() {
        assert_eq!(
            Value::Int(3).compare(&Value::Float(3.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(4.0).compare(&Value::Int(4)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn null_compares_with_nothing() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), None);
    }

    #[test]
    fn mismatched_kinds_are_incomparable() {
        assert_eq!(Value::Bool(true).compare(&Value::Int(1)), None);
        assert_eq!(Value::Text("1".into()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
