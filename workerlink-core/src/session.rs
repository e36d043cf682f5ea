use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use snafu::prelude::*;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cancellation::CancellationTable;
use crate::dispatcher::Dispatcher;
use crate::error::{InvalidDirectiveSnafu, InvalidRepeatCountSnafu, WorkerError, WorkerResult};
use crate::event::{DispatcherEvent, EmittedEvent, WorkerEvent};
use crate::features::{Features, UPDATED_AT};
use crate::handler::WorkerHandler;
use crate::message::{OutboundMessage, TransmitResult, WorkItem};
use crate::metadata::Metadata;
use crate::scheduler::Scheduler;
use crate::task::{EchoTask, TaskEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// The work queue the session answers for
    pub directive: String,
    /// Wait before each echo
    pub delay: Duration,
    /// How many echoes each work item gets, at least 1
    pub repeat_count: u32,
    pub transmit_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            directive: "echo".to_string(),
            delay: Duration::ZERO,
            repeat_count: 1,
            transmit_timeout: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> WorkerResult<()> {
        ensure!(
            !self.directive.is_empty() && !self.directive.contains('-'),
            InvalidDirectiveSnafu {
                directive: self.directive.as_str()
            }
        );
        ensure!(
            self.repeat_count >= 1,
            InvalidRepeatCountSnafu {
                count: self.repeat_count
            }
        );
        Ok(())
    }
}

/// Re-entries into the session from its own asynchronous work.
#[derive(Debug)]
pub enum SessionEvent {
    /// A scheduled tick fired for the work item with this id
    Tick(String),
    TransmitComplete(TransmitCompletion),
}

#[derive(Debug)]
pub struct TransmitCompletion {
    pub work_item_id: String,
    pub message_id: String,
    pub result: WorkerResult<TransmitResult>,
}

/// Bridges inbound work items to outbound echoes. All methods are meant to be called from a single task, one at a time.
pub struct Session<D: Dispatcher, S: Scheduler> {
    config: SessionConfig,
    dispatcher: Arc<D>,
    scheduler: S,
    events: UnboundedSender<SessionEvent>,
    tasks: HashMap<String, EchoTask>,
    /// Finished work items waiting on their last transmit, keyed by that transmit's message id
    closing: HashMap<String, WorkItem>,
    cancellations: CancellationTable,
    features: Features,
    disconnected: bool,
}

impl<D: Dispatcher, S: Scheduler> fmt::Debug for Session<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("directive", &self.config.directive)
            .field("live_tasks", &self.cancellations.len())
            .field("disconnected", &self.disconnected)
            .finish()
    }
}

impl<D: Dispatcher, S: Scheduler> Session<D, S> {
    /// `events` must feed the same channel the scheduler posts its ticks to.
    pub fn new(
        config: SessionConfig,
        dispatcher: Arc<D>,
        scheduler: S,
        events: UnboundedSender<SessionEvent>,
        features: Features,
    ) -> WorkerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dispatcher,
            scheduler,
            events,
            tasks: HashMap::new(),
            closing: HashMap::new(),
            cancellations: CancellationTable::new(),
            features,
            disconnected: false,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn live_tasks(&self) -> usize {
        self.cancellations.len()
    }

    pub fn task(&self, id: &str) -> Option<&EchoTask> {
        self.tasks.get(id)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn feature(&self, key: &str) -> WorkerResult<&str> {
        self.features.get(key)
    }

    /// Upserts a feature and republishes the whole table. Returns `true` when the key is new.
    pub async fn set_feature(&mut self, key: &str, value: String) -> WorkerResult<bool> {
        let created = self.features.set(key, value);
        self.dispatcher
            .publish_features(&self.config.directive, &self.features)
            .await
            .map_err(|e| WorkerError::CouldNotPublishFeatures {
                directive: self.config.directive.clone(),
                reason: format!("{:?}", e),
            })?;
        Ok(created)
    }

    pub async fn handle(&mut self, event: SessionEvent) -> WorkerResult<()> {
        match event {
            SessionEvent::Tick(id) => self.echo_tick(&id).await,
            SessionEvent::TransmitComplete(completion) => {
                self.on_transmit_complete(completion).await
            }
        }
    }

    /// Runs one iteration of the task for `id`: stop if it was cancelled, otherwise transmit once and re-arm or retire.
    pub async fn echo_tick(&mut self, id: &str) -> WorkerResult<()> {
        if self.disconnected {
            debug!(directive=?self.config.directive, "Ignoring tick for {} after disconnect", id);
            return Ok(());
        }

        let fired = {
            let task = match self.tasks.get_mut(id) {
                Some(task) => task,
                None => {
                    debug!(directive=?self.config.directive, "Ignoring tick for {}, it is no longer live", id);
                    return Ok(());
                }
            };

            if task.is_cancelled() {
                task.transition(TaskEvent::CancelObserved)?;
                None
            } else {
                task.transition(TaskEvent::TickFired)?;
                debug!(
                    directive=?self.config.directive,
                    "loop iteration {} of {} for {}",
                    task.iteration(),
                    task.iterations(),
                    id
                );
                let message = OutboundMessage::echo_of(task.item());
                Some((message, task.consume_iteration()))
            }
        };

        let (message, remaining) = match fired {
            Some(fired) => fired,
            None => {
                info!(directive=?self.config.directive, "Work item {} was cancelled", id);
                self.retire(id).await;
                return Ok(());
            }
        };

        let message_id = message.message_id.clone();
        self.spawn_transmit(id, message);

        if remaining > 0 {
            self.arm(id, TaskEvent::Rescheduled).await
        } else {
            if let Some(task) = self.tasks.get_mut(id) {
                task.transition(TaskEvent::Exhausted)?;
            }
            // End goes out once the last transmit has completed
            if let Some(task) = self.take(id) {
                self.closing.insert(message_id, task.item().clone());
            }
            Ok(())
        }
    }

    /// Handles the outcome of one transmit. Failures are reported but never end the task that sent it. The completion
    /// of a work item's last transmit, successful or not, emits its `End`.
    pub async fn on_transmit_complete(&mut self, completion: TransmitCompletion) -> WorkerResult<()> {
        if self.disconnected {
            debug!(directive=?self.config.directive, "Ignoring transmit completion for {} after disconnect", completion.message_id);
            return Ok(());
        }

        let TransmitCompletion {
            work_item_id,
            message_id,
            result,
        } = completion;

        let closing = self.closing.remove(&message_id);
        let outcome = self.settle(work_item_id, message_id, result).await;
        if let Some(item) = closing {
            self.emit_end(&item).await;
        }
        outcome
    }

    async fn settle(
        &mut self,
        work_item_id: String,
        message_id: String,
        result: WorkerResult<TransmitResult>,
    ) -> WorkerResult<()> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(directive=?self.config.directive, "{}", e);
                return Err(e);
            }
        };

        if !response.success() {
            let err = WorkerError::TransmitFailed {
                message_id,
                work_item_id,
                reason: format!(
                    "the dispatcher answered with response code {}",
                    response.response_code
                ),
            };
            error!(directive=?self.config.directive, "{}", err);
            return Err(err);
        }

        debug!(directive=?self.config.directive, "response_code = {} for {}", response.response_code, message_id);
        for (key, value) in response.response_metadata.iter() {
            debug!(directive=?self.config.directive, "response_metadata[{}] = {}", key, value);
        }
        if !response.response_data.is_empty() {
            debug!(
                directive=?self.config.directive,
                "response_data = {}",
                String::from_utf8_lossy(&response.response_data)
            );
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.set_feature(UPDATED_AT, now).await.map(|_| ())
    }

    async fn emit(&self, event: WorkerEvent, item: &WorkItem, data: Metadata) -> WorkerResult<()> {
        let emitted = EmittedEvent {
            event,
            message_id: item.id.clone(),
            response_to: item.response_to.clone(),
            data,
        };
        self.dispatcher
            .emit_event(emitted)
            .await
            .map_err(|e| WorkerError::CouldNotEmitEvent {
                event: event.to_string(),
                id: item.id.clone(),
                reason: format!("{:?}", e),
            })
    }

    /// Asks the scheduler for the next tick of `id`, moving the task along with `event`.
    async fn arm(&mut self, id: &str, event: TaskEvent) -> WorkerResult<()> {
        match self.scheduler.schedule_after(self.config.delay, id) {
            Ok(handle) => {
                if let Some(task) = self.tasks.get_mut(id) {
                    task.transition(event)?;
                    task.arm(handle);
                }
                Ok(())
            }
            Err(source) => {
                if let Some(task) = self.tasks.get_mut(id) {
                    task.transition(TaskEvent::ScheduleFailed)?;
                }
                self.retire(id).await;
                Err(WorkerError::SchedulerUnavailable {
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Takes `id` out of the table and the task map. Dropping the task aborts its pending tick.
    fn take(&mut self, id: &str) -> Option<EchoTask> {
        self.cancellations.remove(id);
        let task = self.tasks.remove(id)?;
        debug!(directive=?self.config.directive, "Removed task {} ({:?})", id, task.state());
        Some(task)
    }

    /// Removes `id` and tells the dispatcher the item is done.
    async fn retire(&mut self, id: &str) {
        if let Some(task) = self.take(id) {
            self.emit_end(task.item()).await;
        }
    }

    async fn emit_end(&self, item: &WorkItem) {
        if let Err(e) = self.emit(WorkerEvent::End, item, Metadata::new()).await {
            warn!(directive=?self.config.directive, "{}", e);
        }
    }

    fn spawn_transmit(&self, work_item_id: &str, message: OutboundMessage) {
        let work_item_id = work_item_id.to_string();
        let message_id = message.message_id.clone();
        let events = self.events.clone();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                let result = Err(WorkerError::TransmitFailed {
                    message_id: message_id.clone(),
                    work_item_id: work_item_id.clone(),
                    reason: "there is no async runtime to transmit on".to_string(),
                });
                let completion = TransmitCompletion {
                    work_item_id,
                    message_id,
                    result,
                };
                if events.send(SessionEvent::TransmitComplete(completion)).is_err() {
                    debug!(directive=?self.config.directive, "Session went away before transmit failed");
                }
                return;
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let limit = self.config.transmit_timeout;
        debug!(directive=?self.config.directive, "Transmitting {} in response to {}", message_id, work_item_id);
        runtime.spawn(async move {
            let outcome = match limit {
                Some(limit) => match timeout(limit, dispatcher.transmit(message)).await {
                    Ok(outcome) => outcome.map_err(|e| format!("{:?}", e)),
                    Err(_) => Err(format!("no response within {:?}", limit)),
                },
                None => dispatcher
                    .transmit(message)
                    .await
                    .map_err(|e| format!("{:?}", e)),
            };

            let result = outcome.map_err(|reason| WorkerError::TransmitFailed {
                message_id: message_id.clone(),
                work_item_id: work_item_id.clone(),
                reason,
            });
            let completion = TransmitCompletion {
                work_item_id,
                message_id,
                result,
            };
            if events.send(SessionEvent::TransmitComplete(completion)).is_err() {
                debug!("Session went away before transmit completed");
            }
        });
    }
}

#[async_trait]
impl<D: Dispatcher, S: Scheduler> WorkerHandler for Session<D, S> {
    async fn on_receive(&mut self, item: WorkItem) -> WorkerResult<()> {
        if self.disconnected {
            debug!(directive=?self.config.directive, "Ignoring work item {} after disconnect", item.id);
            return Ok(());
        }

        let token = self.cancellations.insert(&item.id)?;
        debug!(directive=?self.config.directive, "Received work item {} for {}", item.id, item.address);
        debug!(directive=?self.config.directive, "response_to = {:?}", item.response_to);
        for (key, value) in item.metadata.iter() {
            debug!(directive=?self.config.directive, "metadata[{}] = {}", key, value);
        }

        if let Err(e) = self.emit(WorkerEvent::Begin, &item, Metadata::new()).await {
            warn!(directive=?self.config.directive, "{}", e);
        }
        let mut data = Metadata::new();
        data.set("message", item.payload_text());
        if let Err(e) = self.emit(WorkerEvent::Working, &item, data).await {
            warn!(directive=?self.config.directive, "{}", e);
        }

        let id = item.id.clone();
        let task = EchoTask::new(item, self.config.repeat_count, token);
        self.tasks.insert(id.clone(), task);
        self.arm(&id, TaskEvent::Scheduled).await
    }

    async fn on_cancel(&mut self, cancel_id: &str) -> WorkerResult<()> {
        if self.cancellations.cancel(cancel_id) {
            info!(directive=?self.config.directive, "Cancelling work item {}", cancel_id);
        } else {
            debug!(directive=?self.config.directive, "No live work item {} to cancel", cancel_id);
        }
        Ok(())
    }

    async fn on_event(&mut self, event: DispatcherEvent) -> WorkerResult<()> {
        info!(directive=?self.config.directive, "Received dispatcher event {}", event);
        Ok(())
    }

    async fn on_disconnect(&mut self) -> WorkerResult<()> {
        if self.disconnected {
            return Ok(());
        }
        self.disconnected = true;

        let abandoned = self.tasks.len() + self.closing.len();
        self.closing.clear();
        for (id, mut task) in self.tasks.drain() {
            self.cancellations.remove(&id);
            if let Err(e) = task.transition(TaskEvent::Disconnected) {
                warn!(directive=?self.config.directive, "{}", e);
            }
            debug!(
                directive=?self.config.directive,
                "Abandoning work item {} with {} iterations left",
                id,
                task.remaining_iterations()
            );
        }
        info!(directive=?self.config.directive, "Disconnected, abandoned {} tasks", abandoned);
        Ok(())
    }
}
