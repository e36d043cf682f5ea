use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workerlink::application::{WorkerApplicationBuilder, WorkerConfig};
use workerlink::{InProcessDispatcher, WorkItemBuilder, UPDATED_AT};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dispatcher = InProcessDispatcher::default();
    let app = WorkerApplicationBuilder::default()
        .dispatcher(dispatcher.clone())
        .with_config(WorkerConfig::new()?)
        .delay(Duration::from_millis(100))
        .feature("version", "1")
        .build()?;
    info!("Starting worker {} on {}", app.name(), app.directive());

    // Everything is queued before the worker starts, so the cancel is handled well ahead of the first tick
    let directive = app.directive().to_string();
    for (id, payload) in [("greeting", "Hello world"), ("farewell", "Goodbye")] {
        let item = WorkItemBuilder::default()
            .address(directive.as_str())
            .id(id)
            .response_to("demo")
            .payload(payload)
            .build()?;
        dispatcher.deliver_work_item(item);
    }
    dispatcher.deliver_cancel(directive.as_str(), "cancel-1", "farewell");

    let worker = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(500)).await;

    for message in dispatcher.transmitted().await {
        println!(
            "{} -> {:?}: {}",
            message.message_id,
            message.response_to,
            String::from_utf8_lossy(&message.payload)
        );
    }
    for event in dispatcher.events().await {
        println!("{} for {}", event.event, event.message_id);
    }
    if let Some(features) = dispatcher.published_features().await {
        println!("{} = {}", UPDATED_AT, features.get(UPDATED_AT)?);
    }

    dispatcher.deliver_disconnect();
    worker.await??;

    Ok(())
}
