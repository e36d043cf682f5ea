use snafu::prelude::*;

use crate::scheduler::SchedulerError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WorkerError {
    #[snafu(display("A task for work item {} is already in flight", id))]
    DuplicateTask { id: String },
    #[snafu(display(
        "Could not transmit message {} for work item {}: {}",
        message_id,
        work_item_id,
        reason
    ))]
    TransmitFailed {
        message_id: String,
        work_item_id: String,
        reason: String,
    },
    #[snafu(display("Could not schedule work item {}", id))]
    SchedulerUnavailable { id: String, source: SchedulerError },
    #[snafu(display("No value for feature '{}'", key))]
    MissingFeature { key: String },
    #[snafu(display("{} is not a valid directive", directive))]
    InvalidDirective { directive: String },
    #[snafu(display("The repeat count must be at least 1, got {}", count))]
    InvalidRepeatCount { count: u32 },
    #[snafu(display("{} is not a valid metadata object", value))]
    InvalidMetadataFormat { value: String },
    #[snafu(display("Unknown dispatcher event code {}", code))]
    UnknownDispatcherEvent { code: u32 },
    #[snafu(display("Task {} cannot leave {} on {}", id, from, event))]
    InvalidTransition {
        id: String,
        from: String,
        event: String,
    },
    #[snafu(display("Could not emit {} for work item {}: {}", event, id, reason))]
    CouldNotEmitEvent {
        event: String,
        id: String,
        reason: String,
    },
    #[snafu(display("Could not publish features for {}: {}", directive, reason))]
    CouldNotPublishFeatures { directive: String, reason: String },
    #[snafu(display("Could not register directive {}: {}", directive, reason))]
    CouldNotRegister { directive: String, reason: String },
    #[snafu(display("Could not receive from the dispatcher: {}", reason))]
    CouldNotReceive { reason: String },
}

pub type WorkerResult<T> = Result<T, WorkerError>;
