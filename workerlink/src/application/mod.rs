mod builder;
mod config;

use std::fmt;
use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use workerlink_core::{
    Dispatcher, Inbound, Registration, Session, SessionEvent, TokioScheduler, WorkerError,
    WorkerHandler,
};

use crate::error::ApplicationResult;

pub use builder::WorkerApplicationBuilder;
pub use config::WorkerConfig;

/// Stops a running [`WorkerApplication`] from anywhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    /// Signals the application to abandon its tasks and deregister. A signal sent before `run` starts is kept.
    pub fn shutdown(&self) {
        self.0.notify_one()
    }
}

/// The main handle that registers a directive with a dispatcher and drives its session.
pub struct WorkerApplication<D: Dispatcher> {
    id: String,
    name: String,
    remote_content: bool,
    dispatcher: Arc<D>,
    session: Session<D, TokioScheduler>,
    events: UnboundedReceiver<SessionEvent>,
    notify_shutdown: Arc<Notify>,
}

impl<D: Dispatcher> fmt::Debug for WorkerApplication<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerApplication")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("session", &self.session)
            .finish()
    }
}

impl<D: Dispatcher> WorkerApplication<D> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directive(&self) -> &str {
        &self.session.config().directive
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.notify_shutdown))
    }

    /// Registers with the dispatcher and processes deliveries and session events until the dispatcher disconnects,
    /// the inbound stream ends, or a shutdown is requested. Errors from individual callbacks are logged and do not
    /// stop the loop.
    pub async fn run(self) -> ApplicationResult<()> {
        let Self {
            id,
            name,
            remote_content,
            dispatcher,
            mut session,
            mut events,
            notify_shutdown,
        } = self;
        let directive = session.config().directive.clone();

        let registration = Registration {
            directive: directive.clone(),
            remote_content,
            features: session.features().clone(),
        };
        dispatcher
            .register(&registration)
            .await
            .map_err(|e| WorkerError::CouldNotRegister {
                directive: directive.clone(),
                reason: format!("{:?}", e),
            })?;
        info!(id=?id, "Worker {} registered for {}", name, directive);

        let mut outcome = Ok(());
        loop {
            select! {
                _ = notify_shutdown.notified() => {
                    info!(id=?id, "Shutdown requested");
                    break;
                }
                inbound = dispatcher.receive() => match inbound {
                    Ok(Some(inbound)) => {
                        if !dispatch(&mut session, inbound).await {
                            info!(id=?id, "Dispatcher disconnected");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!(id=?id, "Dispatcher stream ended");
                        break;
                    }
                    Err(e) => {
                        let err = WorkerError::CouldNotReceive {
                            reason: format!("{:?}", e),
                        };
                        error!(id=?id, "{}", err);
                        outcome = Err(err.into());
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    if let Err(e) = session.handle(event).await {
                        warn!(id=?id, "{}", e);
                    }
                }
            }
        }

        session.on_disconnect().await?;
        if let Err(e) = dispatcher.deregister(&directive).await {
            warn!(id=?id, "Could not deregister {}: {:?}", directive, e);
        }
        debug!(id=?id, "Worker {} stopped", name);
        outcome
    }
}

/// Hands one delivery to the handler. Returns `false` once the dispatcher has disconnected.
async fn dispatch<H: WorkerHandler>(handler: &mut H, inbound: Inbound) -> bool {
    let result = match inbound {
        Inbound::WorkItem(item) => handler.on_receive(item).await,
        Inbound::Cancel {
            address,
            id,
            cancel_id,
        } => {
            debug!(id=?id, "Cancel request on {} for {}", address, cancel_id);
            handler.on_cancel(&cancel_id).await
        }
        Inbound::Event(event) => handler.on_event(event).await,
        Inbound::Disconnect => return false,
    };

    if let Err(e) = result {
        warn!("{}", e);
    }
    true
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use workerlink_core::{DispatcherEvent, InProcessDispatcher};

    use crate::error::ApplicationError;
    use crate::test::{assert_send, assert_sync, work_item, MockTestDispatcher, MockTestHandler};

    use super::*;

    #[tokio::test]
    async fn dispatch_routes_each_delivery() {
        let mut handler = MockTestHandler::new();
        handler
            .expect_on_receive()
            .times(1)
            .returning(|_| Ok(()));
        handler
            .expect_on_cancel()
            .withf(|cancel_id| cancel_id == "a")
            .times(1)
            .returning(|_| Ok(()));
        handler
            .expect_on_event()
            .times(1)
            .returning(|_| Ok(()));
        handler.expect_on_disconnect().times(0);

        assert!(dispatch(&mut handler, Inbound::WorkItem(work_item("a", "hi"))).await);
        assert!(
            dispatch(
                &mut handler,
                Inbound::Cancel {
                    address: "echo".to_string(),
                    id: "c-1".to_string(),
                    cancel_id: "a".to_string(),
                }
            )
            .await
        );
        assert!(
            dispatch(
                &mut handler,
                Inbound::Event(DispatcherEvent::ConnectionRestored)
            )
            .await
        );
        assert!(!dispatch(&mut handler, Inbound::Disconnect).await);
    }

    #[tokio::test]
    async fn handler_errors_keep_the_loop_going() {
        let mut handler = MockTestHandler::new();
        handler
            .expect_on_receive()
            .times(1)
            .returning(|item| Err(WorkerError::DuplicateTask { id: item.id }));

        assert!(dispatch(&mut handler, Inbound::WorkItem(work_item("a", "hi"))).await);
    }

    #[tokio::test]
    async fn registration_failures_end_the_run() {
        let mut dispatcher = MockTestDispatcher::new();
        dispatcher.expect_register().times(1).returning(|_| Err(()));
        dispatcher.expect_receive().times(0);

        let app = WorkerApplicationBuilder::default()
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        let err = app.run().await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Worker {
                source: WorkerError::CouldNotRegister { .. }
            }
        ));
    }

    #[tokio::test]
    async fn receive_failures_end_the_run_after_deregistering() {
        let mut dispatcher = MockTestDispatcher::new();
        dispatcher.expect_register().times(1).returning(|_| Ok(()));
        dispatcher.expect_receive().times(1).returning(|| Err(()));
        dispatcher
            .expect_deregister()
            .withf(|directive| directive == "echo")
            .times(1)
            .returning(|_| Ok(()));

        let app = WorkerApplicationBuilder::default()
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        let err = app.run().await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Worker {
                source: WorkerError::CouldNotReceive { .. }
            }
        ));
    }

    #[tokio::test]
    async fn an_ended_stream_stops_the_run_cleanly() {
        let mut dispatcher = MockTestDispatcher::new();
        dispatcher.expect_register().times(1).returning(|_| Ok(()));
        dispatcher.expect_receive().times(1).returning(|| Ok(None));
        dispatcher
            .expect_deregister()
            .withf(|directive| directive == "echo")
            .times(1)
            .returning(|_| Ok(()));

        let app = WorkerApplicationBuilder::default()
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), app.run())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_run_is_kept() {
        let dispatcher = InProcessDispatcher::default();
        let app = WorkerApplicationBuilder::default()
            .dispatcher(dispatcher.clone())
            .build()
            .unwrap();

        app.shutdown_handle().shutdown();
        tokio::time::timeout(Duration::from_secs(5), app.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(dispatcher.registrations().await.len(), 1);
        assert_eq!(dispatcher.deregistered().await, vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn registration_carries_the_seeded_features() {
        let dispatcher = InProcessDispatcher::default();
        let app = WorkerApplicationBuilder::default()
            .dispatcher(dispatcher.clone())
            .remote_content(true)
            .feature("version", "1")
            .build()
            .unwrap();

        dispatcher.deliver_disconnect();
        app.run().await.unwrap();

        let registrations = dispatcher.registrations().await;
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].directive, "echo");
        assert!(registrations[0].remote_content);
        assert_eq!(registrations[0].features.get("version").unwrap(), "1");
    }

    #[test]
    fn assertions() {
        assert_send::<WorkerApplication<InProcessDispatcher>>();
        assert_send::<ShutdownHandle>();
        assert_sync::<ShutdownHandle>();
    }
}
