//! Attribute sets and their wire codec
//!
//! Providers exchange attributes as lists of `{Key, Value}` records (or
//! `{Key, Value, PropagateAtLaunch}` for launch-propagated tags). Internally
//! they are unique-keyed maps. Conversions are pure; anything that is not
//! exactly the expected shape is rejected with a [`DecodeError`].

use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, btree_map};

// ============================================================================
// AttributeSet
// ============================================================================

/// Unique-keyed string-to-string mapping of a resource's declared metadata.
///
/// Iteration is in key order, so output built from a set is deterministic
/// regardless of how the set was assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, String>);

impl AttributeSet {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(key, value)` pairs in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Iterate keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Decode wire tags into a set, rejecting duplicate keys
    pub fn from_tags(tags: &[Tag]) -> Result<Self> {
        let mut set = Self::new();
        for tag in tags {
            if set.insert(tag.key.clone(), tag.value.clone()).is_some() {
                return Err(DecodeError::DuplicateKey(tag.key.clone()));
            }
        }
        Ok(set)
    }

    /// Encode the set as wire tags, ordered by key
    pub fn to_tags(&self) -> Vec<Tag> {
        self.iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Decode a heterogeneous JSON map, rejecting any non-string value
    pub fn from_values(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut set = Self::new();
        for (key, value) in map {
            match value {
                serde_json::Value::String(s) => {
                    set.insert(key.clone(), s.clone());
                }
                other => {
                    return Err(DecodeError::NotAString {
                        key: key.clone(),
                        found: json_type_name(other),
                    });
                }
            }
        }
        Ok(set)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for AttributeSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for AttributeSet {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// TaggedAttributeSet
// ============================================================================

/// A value carrying per-entry launch propagation metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedValue {
    pub value: String,
    pub propagate_at_launch: bool,
}

/// Read-only projection of launch-propagated tags.
///
/// There is no diff for this shape; it is decoded for inspection only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaggedAttributeSet(BTreeMap<String, TaggedValue>);

impl TaggedAttributeSet {
    /// Decode wire launch tags, rejecting duplicate keys
    pub fn from_launch_tags(tags: &[LaunchTag]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for tag in tags {
            let entry = TaggedValue {
                value: tag.value.clone(),
                propagate_at_launch: tag.propagate_at_launch,
            };
            if map.insert(tag.key.clone(), entry).is_some() {
                return Err(DecodeError::DuplicateKey(tag.key.clone()));
            }
        }
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&TaggedValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, TaggedValue> {
        self.0.iter()
    }

    /// Drop the metadata, keeping only the values
    pub fn values_only(&self) -> AttributeSet {
        self.iter()
            .map(|(key, tagged)| (key.clone(), tagged.value.clone()))
            .collect()
    }
}

// ============================================================================
// Wire forms
// ============================================================================

/// A provider's wire representation of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Wire representation of an attribute with launch propagation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct LaunchTag {
    pub key: String,
    pub value: String,
    pub propagate_at_launch: bool,
}

/// Decode a raw wire list of `{Key, Value}` records
pub fn decode_tags(wire: serde_json::Value) -> Result<AttributeSet> {
    let tags: Vec<Tag> = serde_json::from_value(wire)?;
    AttributeSet::from_tags(&tags)
}

/// Decode a raw wire list of `{Key, Value, PropagateAtLaunch}` records
pub fn decode_launch_tags(wire: serde_json::Value) -> Result<TaggedAttributeSet> {
    let tags: Vec<LaunchTag> = serde_json::from_value(wire)?;
    TaggedAttributeSet::from_launch_tags(&tags)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tags() {
        let set = decode_tags(json!([
            {"Key": "Name", "Value": "web"},
            {"Key": "Env", "Value": "prod"}
        ]))
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Name"), Some("web"));
        assert_eq!(set.get("Env"), Some("prod"));
    }

    #[test]
    fn test_to_tags_is_key_ordered() {
        let set: AttributeSet = [("b", "2"), ("a", "1")].into_iter().collect();
        let tags = set.to_tags();
        assert_eq!(tags[0].key, "a");
        assert_eq!(tags[1].key, "b");
        assert_eq!(AttributeSet::from_tags(&tags).unwrap(), set);
    }

    #[test]
    fn test_decode_rejects_non_string_value() {
        let err = decode_tags(json!([{"Key": "Count", "Value": 3}])).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let err = decode_tags(json!([{"Key": "Name"}])).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_field() {
        let err = decode_tags(json!([{"Key": "a", "Value": "b", "Extra": 1}])).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_non_list() {
        let err = decode_tags(json!({"Key": "a", "Value": "b"})).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_duplicate_key() {
        let err = decode_tags(json!([
            {"Key": "Name", "Value": "a"},
            {"Key": "Name", "Value": "b"}
        ]))
        .unwrap_err();
        assert_eq!(err, DecodeError::DuplicateKey("Name".to_string()));
    }

    #[test]
    fn test_decode_launch_tags() {
        let set = decode_launch_tags(json!([
            {"Key": "Name", "Value": "asg", "PropagateAtLaunch": true},
            {"Key": "Team", "Value": "infra", "PropagateAtLaunch": false}
        ]))
        .unwrap();

        assert_eq!(
            set.get("Name"),
            Some(&TaggedValue {
                value: "asg".to_string(),
                propagate_at_launch: true,
            })
        );
        assert!(!set.get("Team").unwrap().propagate_at_launch);
        assert_eq!(set.values_only().get("Team"), Some("infra"));
    }

    #[test]
    fn test_decode_launch_tags_rejects_string_flag() {
        let err = decode_launch_tags(json!([
            {"Key": "Name", "Value": "asg", "PropagateAtLaunch": "yes"}
        ]))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_from_values() {
        let map = json!({"Name": "web", "Env": "prod"});
        let set = AttributeSet::from_values(map.as_object().unwrap()).unwrap();
        assert_eq!(set.get("Env"), Some("prod"));

        let bad = json!({"Name": "web", "Port": 80});
        let err = AttributeSet::from_values(bad.as_object().unwrap()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::NotAString {
                key: "Port".to_string(),
                found: "number",
            }
        );
    }
}
