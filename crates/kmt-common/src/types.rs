//! Domain primitive types used across the kmt workspace.

use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A scalar supplied for a parameter by an override document.
///
/// Definition files are hand-written YAML or JSON, so `PORT: 8080` and
/// `DEBUG: true` are accepted next to plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// Any string value.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// An insertion-ordered set of `key: value` labels.
///
/// Document order matters: gateway selectors are built by walking the
/// labels in the order they were declared. Setting an existing key keeps
/// its original position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(Vec<(String, String)>);

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts or replaces the value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Iterates over `(key, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for LabelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelSetVisitor;

        impl<'de> Visitor<'de> for LabelSetVisitor {
            type Value = LabelSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of label names to scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LabelSet, A::Error> {
                let mut labels = LabelSet::new();
                while let Some((key, value)) = map.next_entry::<String, ParamValue>()? {
                    labels.set(key, value.to_string());
                }
                Ok(labels)
            }
        }

        deserializer.deserialize_map(LabelSetVisitor)
    }
}

/// Artifact layout produced by the emitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Params document, gateway descriptors, and Jsonnet deployments.
    #[default]
    Ksonnet,
    /// Per-service `configMap.env` files and gateway descriptors.
    Kustomize,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ksonnet => write!(f, "ksonnet"),
            Self::Kustomize => write!(f, "kustomize"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = crate::error::KmtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ksonnet" => Ok(Self::Ksonnet),
            "kustomize" => Ok(Self::Kustomize),
            other => Err(crate::error::KmtError::Config {
                message: format!("unsupported output format: {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_value_accepts_yaml_scalars() {
        let values: Vec<ParamValue> =
            serde_yaml::from_str("[8080, true, 0.5, postgres://db]").expect("deserialize");
        assert_eq!(values[0], ParamValue::Integer(8080));
        assert_eq!(values[1], ParamValue::Bool(true));
        assert_eq!(values[2], ParamValue::Float(0.5));
        assert_eq!(values[3], ParamValue::from("postgres://db"));
    }

    #[test]
    fn param_value_displays_without_quotes() {
        assert_eq!(ParamValue::Integer(3).to_string(), "3");
        assert_eq!(ParamValue::from("svc-a").to_string(), "svc-a");
    }

    #[test]
    fn label_set_preserves_document_order() {
        let labels: LabelSet =
            serde_yaml::from_str("tier: frontend\nname: svc-a\nzone: eu\n").expect("deserialize");
        let keys: Vec<&str> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["tier", "name", "zone"]);
    }

    #[test]
    fn label_set_replace_keeps_position() {
        let mut labels: LabelSet = [("a", "1"), ("b", "2")].into_iter().collect();
        labels.set("a", "3");
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn label_set_serializes_as_mapping() {
        let labels: LabelSet = [("tier", "backend")].into_iter().collect();
        let json = serde_json::to_string(&labels).expect("serialize");
        assert_eq!(json, r#"{"tier":"backend"}"#);
    }

    #[test]
    fn output_format_parses_known_names() {
        assert_eq!("kustomize".parse::<OutputFormat>().ok(), Some(OutputFormat::Kustomize));
        assert!("helm".parse::<OutputFormat>().is_err());
    }
}
