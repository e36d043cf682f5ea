use std::sync::Arc;
use std::time::Duration;

use snafu::prelude::*;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::Notify;
use uuid::Uuid;
use workerlink_core::{Dispatcher, Features, Session, SessionConfig, TokioScheduler};

use crate::error::{ApplicationResult, MissingDispatcherSnafu};

use super::config::WorkerConfig;
use super::WorkerApplication;

#[derive(Debug)]
pub struct WorkerApplicationBuilder<D: Dispatcher> {
    id: String,
    name: String,
    dispatcher: Option<D>,
    config: SessionConfig,
    remote_content: bool,
    features: Features,
}

impl<D: Dispatcher> WorkerApplicationBuilder<D> {
    #[must_use = "An application must be built in order to use"]
    pub fn dispatcher(mut self, dispatcher: D) -> WorkerApplicationBuilder<D> {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use = "An application must be built in order to use"]
    pub fn directive(mut self, directive: impl Into<String>) -> WorkerApplicationBuilder<D> {
        self.config.directive = directive.into();
        self
    }

    #[must_use = "An application must be built in order to use"]
    pub fn delay(mut self, delay: Duration) -> WorkerApplicationBuilder<D> {
        self.config.delay = delay;
        self
    }

    #[must_use = "An application must be built in order to use"]
    pub fn repeat_count(mut self, repeat_count: u32) -> WorkerApplicationBuilder<D> {
        self.config.repeat_count = repeat_count;
        self
    }

    /// Bounds every transmit. A transmit that runs out of time is reported as failed.
    #[must_use = "An application must be built in order to use"]
    pub fn transmit_timeout(mut self, limit: Duration) -> WorkerApplicationBuilder<D> {
        self.config.transmit_timeout = Some(limit);
        self
    }

    #[must_use = "An application must be built in order to use"]
    pub fn remote_content(mut self, remote_content: bool) -> WorkerApplicationBuilder<D> {
        self.remote_content = remote_content;
        self
    }

    /// Seeds a feature that is published with the registration.
    #[must_use = "An application must be built in order to use"]
    pub fn feature(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> WorkerApplicationBuilder<D> {
        self.features.set(key, value);
        self
    }

    /// Takes every setting from a loaded [`WorkerConfig`], replacing anything set before.
    #[must_use = "An application must be built in order to use"]
    pub fn with_config(mut self, config: WorkerConfig) -> WorkerApplicationBuilder<D> {
        self.config = SessionConfig {
            directive: config.directive,
            delay: Duration::from_secs(config.delay_seconds),
            repeat_count: config.repeat_count,
            transmit_timeout: config.transmit_timeout_seconds.map(Duration::from_secs),
        };
        self.remote_content = config.remote_content;
        self
    }

    pub fn build(self) -> ApplicationResult<WorkerApplication<D>> {
        let dispatcher = Arc::new(self.dispatcher.context(MissingDispatcherSnafu)?);

        let (events_tx, events_rx) = unbounded_channel();
        let scheduler = TokioScheduler::new(events_tx.clone());
        let session = Session::new(
            self.config,
            Arc::clone(&dispatcher),
            scheduler,
            events_tx,
            self.features,
        )?;

        Ok(WorkerApplication {
            id: self.id,
            name: self.name,
            remote_content: self.remote_content,
            dispatcher,
            session,
            events: events_rx,
            notify_shutdown: Arc::new(Notify::new()),
        })
    }
}

impl<D: Dispatcher> Default for WorkerApplicationBuilder<D> {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        let petname = petname::Petnames::default().generate(&mut rng, 3, "-");
        Self {
            id: Uuid::new_v4().to_string(),
            name: petname,
            dispatcher: None,
            config: SessionConfig::default(),
            remote_content: false,
            features: Features::default(),
        }
    }
}
