use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InvalidMetadataFormatSnafu, WorkerResult};

/// A set of string key/value pairs carried alongside work items, transmits and events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metadata from a JSON object whose values are all strings. Anything else is rejected.
    pub fn from_json(value: &Value) -> WorkerResult<Self> {
        let object = match value.as_object() {
            Some(object) => object,
            None => {
                return InvalidMetadataFormatSnafu {
                    value: value.to_string(),
                }
                .fail()
            }
        };

        let mut metadata = Self::new();
        for (key, entry) in object {
            match entry.as_str() {
                Some(entry) => {
                    metadata.set(key.as_str(), entry);
                }
                None => {
                    return InvalidMetadataFormatSnafu {
                        value: value.to_string(),
                    }
                    .fail()
                }
            }
        }
        Ok(metadata)
    }

    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        Value::Object(object)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Inserts or replaces `key`. Returns `true` when the key was not present before.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.0.insert(key.into(), value.into()).is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
