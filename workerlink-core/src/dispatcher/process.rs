use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::debug;

use crate::event::{DispatcherEvent, EmittedEvent};
use crate::features::Features;
use crate::message::{OutboundMessage, TransmitResult, WorkItem};
use crate::metadata::Metadata;

use super::{Dispatcher, Inbound, Registration};

#[derive(Debug)]
struct Shared {
    inbound_tx: UnboundedSender<Inbound>,
    inbound_rx: Mutex<UnboundedReceiver<Inbound>>,
    registrations: Mutex<Vec<Registration>>,
    transmitted: Mutex<Vec<OutboundMessage>>,
    events: Mutex<Vec<EmittedEvent>>,
    features: Mutex<Option<Features>>,
    deregistered: Mutex<Vec<String>>,
    response_code: AtomicI32,
}

/// A dispatcher living in the same process. Deliveries are queued in memory and everything the worker sends is
/// recorded for inspection. Clones share the same state.
#[derive(Debug, Clone)]
pub struct InProcessDispatcher {
    shared: Arc<Shared>,
}

impl Default for InProcessDispatcher {
    fn default() -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                inbound_tx,
                inbound_rx: Mutex::new(inbound_rx),
                registrations: Default::default(),
                transmitted: Default::default(),
                events: Default::default(),
                features: Default::default(),
                deregistered: Default::default(),
                response_code: AtomicI32::new(0),
            }),
        }
    }
}

impl InProcessDispatcher {
    fn deliver(&self, inbound: Inbound) {
        // The receiver lives as long as the sender, so this only fails while tearing down
        if self.shared.inbound_tx.send(inbound).is_err() {
            debug!("Dropping delivery, the dispatcher is gone");
        }
    }

    pub fn deliver_work_item(&self, item: WorkItem) {
        self.deliver(Inbound::WorkItem(item));
    }

    pub fn deliver_cancel(
        &self,
        address: impl Into<String>,
        id: impl Into<String>,
        cancel_id: impl Into<String>,
    ) {
        self.deliver(Inbound::Cancel {
            address: address.into(),
            id: id.into(),
            cancel_id: cancel_id.into(),
        });
    }

    pub fn deliver_event(&self, event: DispatcherEvent) {
        self.deliver(Inbound::Event(event));
    }

    pub fn deliver_disconnect(&self) {
        self.deliver(Inbound::Disconnect);
    }

    /// Sets the response code every following transmit is answered with. Negative codes are failures.
    pub fn respond_with(&self, response_code: i32) {
        self.shared
            .response_code
            .store(response_code, Ordering::SeqCst);
    }

    pub async fn registrations(&self) -> Vec<Registration> {
        self.shared.registrations.lock().await.clone()
    }

    pub async fn transmitted(&self) -> Vec<OutboundMessage> {
        self.shared.transmitted.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<EmittedEvent> {
        self.shared.events.lock().await.clone()
    }

    pub async fn published_features(&self) -> Option<Features> {
        self.shared.features.lock().await.clone()
    }

    pub async fn deregistered(&self) -> Vec<String> {
        self.shared.deregistered.lock().await.clone()
    }
}

#[async_trait]
impl Dispatcher for InProcessDispatcher {
    type Error = ();

    async fn register(&self, registration: &Registration) -> Result<(), Self::Error> {
        let mut write_guard = self.shared.registrations.lock().await;
        write_guard.push(registration.clone());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Inbound>, Self::Error> {
        let mut read_guard = self.shared.inbound_rx.lock().await;
        Ok(read_guard.recv().await)
    }

    async fn transmit(&self, message: OutboundMessage) -> Result<TransmitResult, Self::Error> {
        let response_code = self.shared.response_code.load(Ordering::SeqCst);
        self.shared.transmitted.lock().await.push(message);
        Ok(TransmitResult::new(response_code, Metadata::new(), vec![]))
    }

    async fn emit_event(&self, event: EmittedEvent) -> Result<(), Self::Error> {
        self.shared.events.lock().await.push(event);
        Ok(())
    }

    async fn publish_features(
        &self,
        _directive: &str,
        features: &Features,
    ) -> Result<(), Self::Error> {
        let mut write_guard = self.shared.features.lock().await;
        write_guard.replace(features.clone());
        Ok(())
    }

    async fn deregister(&self, directive: &str) -> Result<(), Self::Error> {
        self.shared
            .deregistered
            .lock()
            .await
            .push(directive.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test::{assert_send, assert_sync, work_item};
    use crate::WorkerEvent;

    use super::*;

    #[tokio::test]
    async fn deliveries_are_received_in_order() {
        let dispatcher = InProcessDispatcher::default();
        dispatcher.deliver_work_item(work_item("a", "hi"));
        dispatcher.deliver_cancel("echo", "c-1", "a");
        dispatcher.deliver_event(DispatcherEvent::ConnectionRestored);
        dispatcher.deliver_disconnect();

        assert_eq!(
            dispatcher.receive().await.unwrap(),
            Some(Inbound::WorkItem(work_item("a", "hi")))
        );
        assert_eq!(
            dispatcher.receive().await.unwrap(),
            Some(Inbound::Cancel {
                address: "echo".to_string(),
                id: "c-1".to_string(),
                cancel_id: "a".to_string(),
            })
        );
        assert_eq!(
            dispatcher.receive().await.unwrap(),
            Some(Inbound::Event(DispatcherEvent::ConnectionRestored))
        );
        assert_eq!(dispatcher.receive().await.unwrap(), Some(Inbound::Disconnect));
    }

    #[tokio::test]
    async fn clones_share_recordings() {
        let dispatcher = InProcessDispatcher::default();
        let clone = dispatcher.clone();
        let item = work_item("a", "hi");

        clone
            .transmit(OutboundMessage::echo_of(&item))
            .await
            .unwrap();
        clone
            .emit_event(EmittedEvent {
                event: WorkerEvent::Working,
                message_id: "a".to_string(),
                response_to: None,
                data: Metadata::new(),
            })
            .await
            .unwrap();

        assert_eq!(dispatcher.transmitted().await.len(), 1);
        assert_eq!(dispatcher.events().await.len(), 1);
    }

    #[tokio::test]
    async fn transmit_answers_with_the_configured_code() {
        let dispatcher = InProcessDispatcher::default();
        let item = work_item("a", "hi");

        let ok = dispatcher
            .transmit(OutboundMessage::echo_of(&item))
            .await
            .unwrap();
        assert!(ok.success());

        dispatcher.respond_with(-1);
        let failed = dispatcher
            .transmit(OutboundMessage::echo_of(&item))
            .await
            .unwrap();
        assert!(!failed.success());
    }

    #[tokio::test]
    async fn publish_features_replaces_the_table() {
        let dispatcher = InProcessDispatcher::default();
        let mut features = Features::new();
        features.set("version", "1");
        dispatcher.publish_features("echo", &features).await.unwrap();
        features.set("version", "2");
        dispatcher.publish_features("echo", &features).await.unwrap();

        let published = dispatcher.published_features().await.unwrap();
        assert_eq!(published.get("version").unwrap(), "2");
    }

    #[test]
    fn assertions() {
        assert_send::<InProcessDispatcher>();
        assert_sync::<InProcessDispatcher>();
    }
}
