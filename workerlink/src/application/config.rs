use config::{Config, Environment, File};
use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ApplicationResult, ConfigurationSnafu};

/// Worker settings read from an optional `Workerlink` file and `WORKERLINK_*` environment variables.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    pub directive: String,
    pub delay_seconds: u64,
    pub repeat_count: u32,
    pub remote_content: bool,
    pub transmit_timeout_seconds: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            directive: "echo".to_string(),
            delay_seconds: 0,
            repeat_count: 1,
            remote_content: false,
            transmit_timeout_seconds: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> ApplicationResult<Self> {
        let mut s = Config::default();

        s.merge(File::with_name("Workerlink").required(false))
            .context(ConfigurationSnafu)?;
        s.merge(Environment::with_prefix("workerlink"))
            .context(ConfigurationSnafu)?;

        s.try_into().context(ConfigurationSnafu)
    }
}
