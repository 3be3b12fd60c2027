//! Variable values with deep merge support
//!
//! Variables flow through the resolution chain as a closed sum type: a
//! [`Value`] is a scalar, a sequence or a mapping. Mappings keep their
//! insertion order so that rendered output and content hashes are stable.

use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Insertion-ordered mapping of variable names to values
pub type Mapping = IndexMap<String, Value>;

/// Leaf values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A variable value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    pub const NULL: Value = Value::Scalar(Scalar::Null);

    /// Parse a YAML document into a value
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Ok(Self::from(value))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::String(s.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    /// Short name of the value kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(Scalar::Null) => "null",
            Value::Scalar(Scalar::Bool(_)) => "bool",
            Value::Scalar(Scalar::Int(_)) => "int",
            Value::Scalar(Scalar::Float(_)) => "float",
            Value::Scalar(Scalar::String(_)) => "string",
            Value::Sequence(_) => "list",
            Value::Mapping(_) => "dict",
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::NULL,
            serde_yaml::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            serde_yaml::Value::Number(n) => Value::Scalar(number_to_scalar(&n)),
            serde_yaml::Value::String(s) => Value::Scalar(Scalar::String(s)),
            serde_yaml::Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}

fn number_to_scalar(n: &serde_yaml::Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else {
        Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => key_to_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Parse a YAML document that must hold a mapping
///
/// An empty (null) document is an empty mapping.
pub fn mapping_from_yaml(yaml: &str) -> Result<Mapping> {
    match Value::from_yaml(yaml)? {
        Value::Mapping(map) => Ok(map),
        Value::Scalar(Scalar::Null) => Ok(Mapping::new()),
        other => Err(CoreError::InvalidValues {
            message: format!("expected a dict at the document root, found {}", other.kind_name()),
        }),
    }
}

/// Deep merge `overlay` into `base`
///
/// Rules:
/// - Mappings on both sides: recursive merge
/// - Anything else: overlay replaces base (lists are not appended)
pub fn deep_merge(base: &mut Mapping, overlay: Mapping) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) => {
                deep_merge(base_map, overlay_map);
            }
            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}

/// Stable content hash of a mapping (SHA-256, hex encoded)
pub fn content_hash(map: &Mapping) -> String {
    let mut hasher = Sha256::new();
    hash_mapping(&mut hasher, map);
    hex::encode(hasher.finalize())
}

fn hash_mapping(hasher: &mut Sha256, map: &Mapping) {
    hasher.update(b"{");
    hasher.update((map.len() as u64).to_le_bytes());
    for (key, value) in map {
        hash_str(hasher, key);
        hash_value(hasher, value);
    }
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Scalar(Scalar::Null) => hasher.update(b"n"),
        Value::Scalar(Scalar::Bool(b)) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Scalar(Scalar::Int(i)) => {
            hasher.update(b"i");
            hasher.update(i.to_le_bytes());
        }
        Value::Scalar(Scalar::Float(f)) => {
            hasher.update(b"d");
            hasher.update(f.to_bits().to_le_bytes());
        }
        Value::Scalar(Scalar::String(s)) => {
            hasher.update(b"s");
            hash_str(hasher, s);
        }
        Value::Sequence(seq) => {
            hasher.update(b"[");
            hasher.update((seq.len() as u64).to_le_bytes());
            for item in seq {
                hash_value(hasher, item);
            }
        }
        Value::Mapping(map) => hash_mapping(hasher, map),
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        mapping_from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_deep_merge() {
        let mut base = mapping(
            r#"
a: foo
b: 123.456
c: true
d:
  x: 1
  y: 2
  z: 3
e: [my, very, own, context]
"#,
        );
        let overlay = mapping(
            r#"
a: bar
d:
  x: 0.99
  zz: {}
e: [new, list]
"#,
        );

        deep_merge(&mut base, overlay);

        assert_eq!(base["a"].as_str(), Some("bar"));
        assert_eq!(base["b"], Value::Scalar(Scalar::Float(123.456)));
        let d = base["d"].as_mapping().unwrap();
        assert_eq!(d["x"], Value::Scalar(Scalar::Float(0.99)));
        assert_eq!(d["y"], Value::Scalar(Scalar::Int(2)));
        assert_eq!(d["zz"], Value::Mapping(Mapping::new()));
        assert_eq!(base["e"].as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_merge_replaces_mapping_with_scalar() {
        let mut base = mapping("x: {p: 1}");
        deep_merge(&mut base, mapping("x: 5"));
        assert_eq!(base["x"], Value::Scalar(Scalar::Int(5)));
    }

    #[test]
    fn test_merge_keeps_insertion_order() {
        let mut base = mapping("b: 1\na: 2");
        deep_merge(&mut base, mapping("c: 3\nb: 4"));
        let keys: Vec<&str> = base.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_load_yaml_kinds() {
        let value = Value::from_yaml(
            "a: foo\nb: 123.456\nc: true\nd:\n  x: 1\ne:\n  - my\n  - own\nf: ~\n",
        )
        .unwrap();
        let map = value.as_mapping().unwrap();

        assert_eq!(map["a"].kind_name(), "string");
        assert_eq!(map["b"].kind_name(), "float");
        assert_eq!(map["c"].kind_name(), "bool");
        assert_eq!(map["d"].as_mapping().unwrap()["x"].kind_name(), "int");
        assert_eq!(map["e"].kind_name(), "list");
        assert!(map["f"].is_null());
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let value = Value::from_yaml("1: one\ntrue: yes-key\n").unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map["1"].as_str(), Some("one"));
        assert_eq!(map["true"].as_str(), Some("yes-key"));
    }

    #[test]
    fn test_mapping_from_yaml_rejects_lists() {
        assert!(matches!(
            mapping_from_yaml("- a\n- b\n"),
            Err(CoreError::InvalidValues { .. })
        ));
        assert!(mapping_from_yaml("").unwrap().is_empty());
        assert!(mapping_from_yaml("  :wrong\na: foo\n").is_err());
    }

    #[test]
    fn test_content_hash_is_stable_and_type_aware() {
        let a = mapping("x: 1\ny: [a, b]");
        let b = mapping("x: 1\ny: [a, b]");
        let c = mapping("x: '1'\ny: [a, b]");

        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
        assert_eq!(content_hash(&a).len(), 64);
    }

    #[test]
    fn test_serialize_untagged() {
        let value = Value::from_yaml("a: 1\nb: [true, ~]\nc: {d: x}").unwrap();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"a":1,"b":[true,null],"c":{"d":"x"}}"#);
    }
}
