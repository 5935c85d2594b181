//! Desired Kubernetes resource documents
//!
//! Builders construct typed manifests and convert them into [`Resource`], a
//! JSON object whose keys are strings at every depth. The agent consumes the
//! resources as uniform string-keyed JSON, so no other map shape can reach the
//! wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Ordered string map used for labels, annotations and selectors
pub type StringMap = BTreeMap<String, String>;

/// One Kubernetes resource manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Map<String, Value>);

impl Resource {
    /// Convert a typed manifest into a resource document
    pub fn from_manifest<T: Serialize>(manifest: &T) -> Result<Self> {
        match serde_json::to_value(manifest)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Serialization(format!(
                "manifest must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// `kind` of the resource
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// `metadata.name` of the resource
    pub fn name(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
    }

    /// A single annotation value
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    /// A single label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(Value::as_str)
    }

    /// Look up a nested value by JSON pointer (RFC 6901)
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let rest = pointer.strip_prefix('/')?;
        let (key, tail) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
        let key = key.replace("~1", "/").replace("~0", "~");
        self.0.get(&key)?.pointer(tail)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }
}

/// Kubernetes object metadata as emitted by the builders
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
}

impl ObjectMeta {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: &StringMap,
        annotations: &StringMap,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: labels.clone(),
            annotations: annotations.clone(),
        }
    }
}

/// Label selector with exact matches only
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "StringMap::is_empty")]
    pub match_labels: StringMap,
}

impl LabelSelector {
    /// Selector matching every pod
    pub fn all() -> Self {
        Self::default()
    }

    pub fn single(key: &str, value: &str) -> Self {
        let mut match_labels = StringMap::new();
        match_labels.insert(key.to_string(), value.to_string());
        Self { match_labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        api_version: String,
        kind: String,
        metadata: ObjectMeta,
    }

    #[test]
    fn test_from_manifest_exposes_metadata() {
        let mut annotations = StringMap::new();
        annotations.insert("a/b".to_string(), "c".to_string());
        let sample = Sample {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta::new("cm", "ns", &StringMap::new(), &annotations),
        };

        let resource = Resource::from_manifest(&sample).unwrap();
        assert_eq!(resource.kind(), Some("ConfigMap"));
        assert_eq!(resource.name(), Some("cm"));
        assert_eq!(resource.annotation("a/b"), Some("c"));
        assert_eq!(
            resource.pointer("/metadata/namespace").and_then(Value::as_str),
            Some("ns")
        );
        assert_eq!(resource.as_map().get("apiVersion"), Some(&Value::from("v1")));
        assert_eq!(
            resource
                .pointer("/metadata/annotations/a~1b")
                .and_then(Value::as_str),
            Some("c")
        );
        assert_eq!(resource.pointer("/kind"), Some(&Value::from("ConfigMap")));
        assert!(resource.pointer("kind").is_none());
        assert!(resource.pointer("/metadata/missing").is_none());
    }

    #[test]
    fn test_from_manifest_rejects_non_objects() {
        let result = Resource::from_manifest(&vec![1, 2, 3]);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
