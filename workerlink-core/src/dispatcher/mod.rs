mod process;

use async_trait::async_trait;

pub use process::InProcessDispatcher;

use crate::event::{DispatcherEvent, EmittedEvent};
use crate::features::Features;
use crate::message::{OutboundMessage, TransmitResult, WorkItem};

/// Something the dispatcher delivered to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    WorkItem(WorkItem),
    Cancel {
        address: String,
        id: String,
        cancel_id: String,
    },
    Event(DispatcherEvent),
    Disconnect,
}

/// What a worker announces about itself when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub directive: String,
    pub remote_content: bool,
    pub features: Features,
}

#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    type Error: std::fmt::Debug + Send;

    async fn register(&self, registration: &Registration) -> Result<(), Self::Error>;

    /// Waits for the next delivery. `None` means the dispatcher will deliver nothing more. The returned future may be
    /// dropped before it resolves, so no delivery may be lost when that happens.
    async fn receive(&self) -> Result<Option<Inbound>, Self::Error>;

    async fn transmit(&self, message: OutboundMessage) -> Result<TransmitResult, Self::Error>;

    async fn emit_event(&self, event: EmittedEvent) -> Result<(), Self::Error>;

    /// Replaces the worker's published feature table with `features`.
    async fn publish_features(
        &self,
        directive: &str,
        features: &Features,
    ) -> Result<(), Self::Error>;

    async fn deregister(&self, _directive: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}
