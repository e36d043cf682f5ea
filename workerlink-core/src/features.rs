use serde::{Deserialize, Serialize};

use crate::error::{MissingFeatureSnafu, WorkerResult};
use crate::metadata::Metadata;

/// Feature key holding the time of the last successful transmit.
pub const UPDATED_AT: &str = "UpdatedAt";

/// Worker-level metadata exposed to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(Metadata);

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> WorkerResult<&str> {
        self.0
            .get(key)
            .ok_or_else(|| MissingFeatureSnafu { key }.build())
    }

    /// Upserts `key`. Returns `true` when the key was not present before.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.0.set(key, value)
    }
}

#[cfg(test)]
mod test {
    use crate::WorkerError;

    use super::*;

    #[test]
    fn get_fails_for_missing_features() {
        let err = Features::new().get(UPDATED_AT).unwrap_err();
        assert!(matches!(err, WorkerError::MissingFeature { key } if key == UPDATED_AT));
    }

    #[test]
    fn set_upserts() {
        let mut features = Features::new();
        assert!(features.set("version", "1"));
        assert!(!features.set("version", "2"));
        assert_eq!(features.get("version").unwrap(), "2");
    }
}
