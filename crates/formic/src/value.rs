use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Runtime value flowing through compiled expressions and the node tree.
///
/// Values are trees: lists and objects own their children, so structural
/// equality and deep comparison always terminate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (missing dependency, block falling off the end, ...).
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    List(Vec<Value>),
    Object(Vec<(Arc<str>, Value)>),
    /// Self-reference sentinel: "leave the current value unchanged".
    /// Produced by the `self` identifier in derived expressions.
    SelfRef,
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }

    /// JS-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::SelfRef => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::List(_) | Value::Object(_) => true,
        }
    }

    /// Numeric coercion (`Number(x)` in the source language).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) | Value::Null => 0.0,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// Strict equality: same variant, equal contents. `NaN !== NaN`.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b) && a == b,
        }
    }

    /// Loose equality: strict plus number/text numeric comparison,
    /// bool-to-number promotion and `null == undefined`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(a), Value::Text(_)) => *a == other.to_number(),
            (Value::Text(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), Value::Number(_) | Value::Text(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Number(_) | Value::Text(_), Value::Bool(_)) => {
                self.to_number() == other.to_number()
            }
            (a, b) => a.strict_eq(b),
        }
    }

    /// Member lookup on objects, plus `length` on lists and text.
    pub fn member(&self, name: &str) -> Value {
        match self {
            Value::Object(fields) => fields
                .iter()
                .find(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Undefined),
            Value::List(items) if name == "length" => Value::Number(items.len() as f64),
            Value::Text(s) if name == "length" => Value::Number(s.chars().count() as f64),
            _ => Value::Undefined,
        }
    }

    /// Computed indexing: lists by number, objects by key.
    pub fn index(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::List(items), Value::Number(n)) => {
                if *n >= 0.0 && n.fract() == 0.0 {
                    items.get(*n as usize).cloned().unwrap_or(Value::Undefined)
                } else {
                    Value::Undefined
                }
            }
            (_, Value::Text(key)) => self.member(key),
            (_, Value::Number(n)) => self.member(&n.to_string()),
            _ => Value::Undefined,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (Arc::from(k.as_str()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. `Undefined` and the sentinel map to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Undefined | Value::Null | Value::SelfRef => json!(null),
            Value::Bool(b) => json!(b),
            // Integer-valued numbers stay integers through a round trip.
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                json!(*n as i64)
            }
            Value::Number(n) if n.is_finite() => json!(n),
            Value::Number(_) => json!(null),
            Value::Text(s) => json!(s.as_ref()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::SelfRef => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::SelfRef => write!(f, "self"),
            Value::Text(s) => write!(f, "{s}"),
            // Integer-valued numbers print without a trailing `.0`.
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(Value::text("no").is_truthy());
        assert!(Value::List(vec![]).is_truthy());
    }

    #[test]
    fn loose_vs_strict() {
        assert!(Value::Number(1.0).loose_eq(&Value::text("1")));
        assert!(!Value::Number(1.0).strict_eq(&Value::text("1")));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn member_and_index() {
        let obj = Value::Object(vec![(Arc::from("a"), Value::Number(1.0))]);
        assert_eq!(obj.member("a"), Value::Number(1.0));
        assert_eq!(obj.member("b"), Value::Undefined);

        let list = Value::List(vec![Value::text("x"), Value::text("y")]);
        assert_eq!(list.index(&Value::Number(1.0)), Value::text("y"));
        assert_eq!(list.member("length"), Value::Number(2.0));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::text("x").to_string(), "x");
    }

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, "x", null, true]}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn integers_survive_json_conversion() {
        assert_eq!(Value::Number(12.0).to_json(), serde_json::json!(12));
        assert_eq!(Value::Number(-3.0).to_json(), serde_json::json!(-3));
        assert_eq!(Value::Number(0.5).to_json(), serde_json::json!(0.5));
        assert_eq!(Value::Number(f64::NAN).to_json(), serde_json::json!(null));
    }
}
