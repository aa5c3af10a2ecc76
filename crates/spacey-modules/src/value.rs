// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script values exchanged through module bindings
//!
//! Values are thread-safe and cheap to clone. Objects have reference
//! identity: cloning a `Value::Object` clones the handle, not the properties,
//! which is what lets a legacy module's partially built exports be observed
//! by a circular `require`.

use crate::namespace::Namespace;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A script value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Mutable object with reference identity
    Object(ObjectRef),
    /// Module namespace object
    Namespace(Namespace),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN never equals itself
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Namespace(a), Value::Namespace(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Create an empty object value
    pub fn object() -> Self {
        Value::Object(ObjectRef::new())
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null or undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// The number held by this value, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string held by this value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The object handle held by this value, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The namespace held by this value, if any
    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Value::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// JavaScript `typeof`
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) | Value::Namespace(_) => "object",
        }
    }

    /// Convert a serde_json value into a script value
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                let obj = ObjectRef::new();
                for (i, v) in arr.iter().enumerate() {
                    obj.set(i.to_string(), Value::from_json(v));
                }
                obj.set("length", Value::Number(arr.len() as f64));
                Value::Object(obj)
            }
            serde_json::Value::Object(map) => {
                let obj = ObjectRef::new();
                for (k, v) in map {
                    obj.set(k.clone(), Value::from_json(v));
                }
                Value::Object(obj)
            }
        }
    }

    /// Snapshot this value as JSON for display
    ///
    /// Namespaces are rendered by their module identifier; use
    /// [`Namespace::to_json`] to read through one.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_within(&mut Vec::new())
    }

    /// `ancestors` holds the objects currently being rendered
    fn to_json_within(&self, ancestors: &mut Vec<ObjectRef>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(obj) if ancestors.iter().any(|seen| seen.ptr_eq(obj)) => {
                serde_json::Value::String("[Circular]".to_string())
            }
            Value::Object(obj) => {
                ancestors.push(obj.clone());
                let map = obj
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json_within(ancestors)))
                    .collect();
                ancestors.pop();
                serde_json::Value::Object(map)
            }
            Value::Namespace(ns) => serde_json::Value::String(format!("[Module: {}]", ns.id())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Namespace(ns) => write!(f, "[Module: {}]", ns.id()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Shared handle to a mutable object
///
/// Every clone refers to the same property table.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<BTreeMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Write a property
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().insert(key.into(), value);
    }

    /// Check if a property exists
    pub fn has(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Property names in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Snapshot of all properties
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if the object has no properties
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Whether two handles refer to the same object
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    // Keys only: objects may reference themselves
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_identity() {
        let obj = ObjectRef::new();
        let held = Value::Object(obj.clone());

        obj.set("x", Value::from(1));

        assert_eq!(held.as_object().and_then(|o| o.get("x")), Some(Value::Number(1.0)));
        assert_eq!(held, Value::Object(obj));
        assert_ne!(held, Value::object());
    }

    #[test]
    fn test_self_reference_renders_circular() {
        let obj = ObjectRef::new();
        obj.set("a", Value::Object(obj.clone()));
        obj.set("b", Value::Object(obj.clone()));
        let shared = Value::object();
        obj.set("c", shared.clone());
        obj.set("d", shared);

        let json = Value::Object(obj).to_json();
        assert_eq!(json["a"], "[Circular]");
        assert_eq!(json["b"], "[Circular]");
        // repeated but acyclic objects render in full
        assert_eq!(json["c"], serde_json::json!({}));
        assert_eq!(json["d"], serde_json::json!({}));
    }

    #[test]
    fn test_nan_is_not_equal() {
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Number(5.0), Value::from(5));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({
            "name": "spacey",
            "tags": ["a", "b"],
            "nested": { "ok": true },
            "none": null
        });
        let value = Value::from_json(&json);
        let obj = value.as_object().unwrap();

        assert_eq!(obj.get("name"), Some(Value::from("spacey")));
        assert_eq!(obj.get("none"), Some(Value::Null));

        let tags = obj.get("tags").unwrap();
        let tags = tags.as_object().unwrap();
        assert_eq!(tags.get("length"), Some(Value::Number(2.0)));
        assert_eq!(tags.get("1"), Some(Value::from("b")));

        assert_eq!(value.to_json()["nested"]["ok"], serde_json::json!(true));
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::from("s").type_of(), "string");
        assert_eq!(Value::object().type_of(), "object");
    }
}
