//! The opaque "script object" representation documents are stored as, and the
//! small reflection API map/reduce evaluation consumes over it.
//!
//! JSON parsing and the choice of an immutable document-body representation
//! are an external collaborator per spec — this module does not write a
//! parser. It reuses `serde_json::Value`, the representation the rest of
//! the ecosystem already settled on for exactly this role, and layers the
//! narrow reflection surface (`count`/`name_at`/`type_of`/typed getters) the
//! map/reduce executor is allowed to see instead of matching on `Value`
//! directly everywhere.

use serde_json::{Map, Value};

/// A document body. Immutable once constructed.
pub type ScriptValue = Value;

/// The type tags the reflection API distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    Null,
    Bool,
    Int32,
    Double,
    String,
    Object,
    Array,
    Undefined,
}

fn type_of_value(v: &Value) -> ScriptType {
    match v {
        Value::Null => ScriptType::Null,
        Value::Bool(_) => ScriptType::Bool,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    ScriptType::Int32
                } else {
                    ScriptType::Double
                }
            } else {
                ScriptType::Double
            }
        }
        Value::String(_) => ScriptType::String,
        Value::Array(_) => ScriptType::Array,
        Value::Object(_) => ScriptType::Object,
    }
}

/// Reflection over a field-name-keyed object value (a document body, or a
/// nested object field within one).
pub trait ScriptObject {
    fn count(&self) -> usize;
    fn name_at(&self, index: usize) -> Option<&str>;
    fn type_at(&self, name: &str) -> ScriptType;

    fn get_bool(&self, name: &str) -> Option<bool>;
    fn get_i32(&self, name: &str) -> Option<i32>;
    fn get_f64(&self, name: &str) -> Option<f64>;
    fn get_string(&self, name: &str) -> Option<&str>;
    fn get_object(&self, name: &str) -> Option<&Map<String, Value>>;
    fn get_array(&self, name: &str) -> Option<&Vec<Value>>;
}

impl ScriptObject for Map<String, Value> {
    fn count(&self) -> usize {
        self.len()
    }

    fn name_at(&self, index: usize) -> Option<&str> {
        self.keys().nth(index).map(String::as_str)
    }

    fn type_at(&self, name: &str) -> ScriptType {
        self.get(name).map(type_of_value).unwrap_or(ScriptType::Undefined)
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    fn get_i32(&self, name: &str) -> Option<i32> {
        i32::try_from(self.get(name)?.as_i64()?).ok()
    }

    fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name)?.as_object()
    }

    fn get_array(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name)?.as_array()
    }
}

/// Reflection over an array value.
pub trait ScriptArray {
    fn count(&self) -> usize;
    fn type_at(&self, index: usize) -> ScriptType;

    fn get_bool(&self, index: usize) -> Option<bool>;
    fn get_i32(&self, index: usize) -> Option<i32>;
    fn get_f64(&self, index: usize) -> Option<f64>;
    fn get_string(&self, index: usize) -> Option<&str>;
    fn get_object(&self, index: usize) -> Option<&Map<String, Value>>;
    fn get_array(&self, index: usize) -> Option<&Vec<Value>>;
}

impl ScriptArray for Vec<Value> {
    fn count(&self) -> usize {
        self.len()
    }

    fn type_at(&self, index: usize) -> ScriptType {
        self.get(index).map(type_of_value).unwrap_or(ScriptType::Undefined)
    }

    fn get_bool(&self, index: usize) -> Option<bool> {
        self.get(index)?.as_bool()
    }

    fn get_i32(&self, index: usize) -> Option<i32> {
        i32::try_from(self.get(index)?.as_i64()?).ok()
    }

    fn get_f64(&self, index: usize) -> Option<f64> {
        self.get(index)?.as_f64()
    }

    fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index)?.as_str()
    }

    fn get_object(&self, index: usize) -> Option<&Map<String, Value>> {
        self.get(index)?.as_object()
    }

    fn get_array(&self, index: usize) -> Option<&Vec<Value>> {
        self.get(index)?.as_array()
    }
}

/// Byte-accurate size of a document body, used for `Database::data_size`.
pub fn body_size(v: &Value) -> usize {
    match v {
        Value::Null => 4,
        Value::Bool(_) => 4,
        Value::Number(n) => n.to_string().len(),
        Value::String(s) => s.len(),
        Value::Array(a) => a.iter().map(body_size).sum::<usize>() + a.len(),
        Value::Object(o) => {
            o.iter().map(|(k, v)| k.len() + body_size(v)).sum::<usize>() + o.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_at_distinguishes_int32_and_double() {
        let obj = json!({"a": 1, "b": 1.5, "c": 2147483648_i64}).as_object().unwrap().clone();
        assert_eq!(obj.type_at("a"), ScriptType::Int32);
        assert_eq!(obj.type_at("b"), ScriptType::Double);
        assert_eq!(obj.type_at("c"), ScriptType::Double);
        assert_eq!(obj.type_at("missing"), ScriptType::Undefined);
    }

    #[test]
    fn array_reflection_round_trips() {
        let arr = json!([1, "x", null]).as_array().unwrap().clone();
        assert_eq!(arr.count(), 3);
        assert_eq!(arr.type_at(0), ScriptType::Int32);
        assert_eq!(arr.type_at(1), ScriptType::String);
        assert_eq!(arr.type_at(2), ScriptType::Null);
    }
}
