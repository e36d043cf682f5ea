use async_trait::async_trait;

use crate::error::WorkerResult;
use crate::event::DispatcherEvent;
use crate::message::WorkItem;

/// The inbound capabilities a worker registers with its dispatcher. Implementations are driven one call at a time.
#[async_trait]
pub trait WorkerHandler: Send {
    /// Called each time the dispatcher delivers a work item.
    async fn on_receive(&mut self, item: WorkItem) -> WorkerResult<()>;

    /// Called when the dispatcher asks for the work item `cancel_id` to be cancelled. Unknown ids must be ignored.
    async fn on_cancel(&mut self, cancel_id: &str) -> WorkerResult<()>;

    async fn on_event(&mut self, event: DispatcherEvent) -> WorkerResult<()>;

    /// Called once the connection to the dispatcher is gone for good.
    async fn on_disconnect(&mut self) -> WorkerResult<()>;
}
