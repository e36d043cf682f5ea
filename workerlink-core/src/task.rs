use tokio_util::sync::CancellationToken;

use crate::error::{InvalidTransitionSnafu, WorkerResult};
use crate::message::WorkItem;
use crate::scheduler::ScheduleHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Every iteration was transmitted
    Completed,
    /// A cancel request was observed at a tick boundary
    Cancelled,
    /// The scheduler refused to arm the next tick
    Failed,
    /// The dispatcher connection went away with iterations left
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Scheduled,
    Firing,
    Removed(RemovalReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Scheduled,
    ScheduleFailed,
    TickFired,
    CancelObserved,
    Rescheduled,
    Exhausted,
    Disconnected,
}

impl TaskState {
    pub fn next(self, event: TaskEvent) -> Option<Self> {
        let next = match (self, event) {
            // Nothing happens to a task once it is out of the table
            (Self::Removed(_), _) => return None,

            (Self::Created, TaskEvent::Scheduled) => Self::Scheduled,
            (Self::Scheduled, TaskEvent::TickFired) => Self::Firing,
            (Self::Scheduled, TaskEvent::CancelObserved) => Self::Removed(RemovalReason::Cancelled),
            (Self::Firing, TaskEvent::Rescheduled) => Self::Scheduled,
            (Self::Firing, TaskEvent::Exhausted) => Self::Removed(RemovalReason::Completed),
            (Self::Created | Self::Firing, TaskEvent::ScheduleFailed) => {
                Self::Removed(RemovalReason::Failed)
            }
            (_, TaskEvent::Disconnected) => Self::Removed(RemovalReason::Abandoned),
            _ => return None,
        };
        Some(next)
    }
}

/// The repeated echo of one work item.
#[derive(Debug)]
pub struct EchoTask {
    item: WorkItem,
    iterations: u32,
    remaining_iterations: u32,
    token: CancellationToken,
    state: TaskState,
    pending: Option<ScheduleHandle>,
}

impl EchoTask {
    pub(crate) fn new(item: WorkItem, iterations: u32, token: CancellationToken) -> Self {
        Self {
            item,
            iterations,
            remaining_iterations: iterations,
            token,
            state: TaskState::Created,
            pending: None,
        }
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn remaining_iterations(&self) -> u32 {
        self.remaining_iterations
    }

    /// The 1-based iteration the next transmit belongs to.
    pub fn iteration(&self) -> u32 {
        self.iterations - self.remaining_iterations + 1
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn transition(&mut self, event: TaskEvent) -> WorkerResult<TaskState> {
        match self.state.next(event) {
            Some(next) => {
                self.state = next;
                Ok(next)
            }
            None => InvalidTransitionSnafu {
                id: self.item.id.as_str(),
                from: format!("{:?}", self.state),
                event: format!("{:?}", event),
            }
            .fail(),
        }
    }

    /// Replaces the pending tick. A previous, already fired tick handle is dropped.
    pub(crate) fn arm(&mut self, handle: ScheduleHandle) {
        self.pending = Some(handle);
    }

    pub(crate) fn consume_iteration(&mut self) -> u32 {
        self.remaining_iterations = self.remaining_iterations.saturating_sub(1);
        self.remaining_iterations
    }
}
