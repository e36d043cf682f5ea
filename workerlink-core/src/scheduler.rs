use std::time::Duration;

use snafu::prelude::*;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::session::SessionEvent;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SchedulerError {
    #[snafu(display("There is no async runtime to schedule on"))]
    NoRuntime,
    #[snafu(display("The session is no longer accepting scheduled events"))]
    Closed,
}

/// A pending, one-shot tick. Dropping the handle cancels the tick if it has not fired yet.
#[derive(Debug)]
pub struct ScheduleHandle(Option<JoinHandle<()>>);

impl ScheduleHandle {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// A handle with nothing behind it, for schedulers that fire ticks some other way.
    pub fn detached() -> Self {
        Self(None)
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Delayed, fire-once callbacks. Re-arming after a tick is the caller's job.
pub trait Scheduler: Send + Sync {
    fn schedule_after(
        &self,
        delay: Duration,
        work_item_id: &str,
    ) -> Result<ScheduleHandle, SchedulerError>;
}

/// Schedules ticks as tokio timers that post [`SessionEvent::Tick`] back to the session.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: UnboundedSender<SessionEvent>,
}

impl TokioScheduler {
    pub fn new(events: UnboundedSender<SessionEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(
        &self,
        delay: Duration,
        work_item_id: &str,
    ) -> Result<ScheduleHandle, SchedulerError> {
        ensure!(!self.events.is_closed(), ClosedSnafu);
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let events = self.events.clone();
        let id = work_item_id.to_string();
        let handle = runtime.spawn(async move {
            sleep(delay).await;
            if events.send(SessionEvent::Tick(id.clone())).is_err() {
                debug!(id=?id, "Session went away before tick fired");
            }
        });
        Ok(ScheduleHandle::new(handle))
    }
}
