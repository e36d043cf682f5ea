//! Echo workers for an external dispatcher
//!
//! This crate provides the worker application, the driver that registers a directive with a dispatcher, feeds every
//! delivery into a [`Session`], and shuts the session down when the dispatcher goes away. The session itself, the
//! dispatcher and scheduler traits, and the in-process dispatcher all live in `workerlink-core` and are re-exported here.
//!
//! # Overview
//!
//! A worker receives work items addressed to its directive and answers each one with `repeat_count` echoes, spaced by
//! `delay`. Every echo is a fresh outbound message correlated to the work item through `response_to`. The dispatcher
//! may cancel a work item at any point; the worker notices at the next tick and stops without sending further echoes.
#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::cargo,
    nonstandard_style,
    rust_2018_idioms,
    clippy::dbg_macro,
    clippy::todo,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::inefficient_to_string,
    clippy::option_option,
    clippy::unnested_or_patterns,
    clippy::needless_continue,
    clippy::needless_borrow,
    unreachable_code,
    unreachable_patterns,
    noop_method_call,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![forbid(non_ascii_idents, unsafe_code, unused_crate_dependencies)]
#![warn(
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    // missing_docs,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    future_incompatible,
    nonstandard_style,
)]
#![allow(clippy::multiple_crate_versions)]

pub use workerlink_core::*;

pub mod application;
pub mod error;

#[cfg(test)]
pub(crate) mod test {
    use async_trait::async_trait;
    use mockall::*;
    use workerlink_core::{
        Dispatcher, DispatcherEvent, EmittedEvent, Features, Inbound, OutboundMessage,
        Registration, TransmitResult, WorkItem, WorkItemBuilder, WorkerHandler, WorkerResult,
    };

    pub(crate) fn assert_send<T: Send>() {}
    pub(crate) fn assert_sync<T: Sync>() {}

    pub(crate) fn work_item(id: &str, payload: &str) -> WorkItem {
        WorkItemBuilder::default()
            .address("echo")
            .id(id)
            .payload(payload)
            .build()
            .unwrap()
    }

    mock! {
        pub TestDispatcher {}

        #[async_trait]
        impl Dispatcher for TestDispatcher {
            type Error = ();

            async fn register(&self, registration: &Registration) -> Result<(), <Self as Dispatcher>::Error>;

            async fn receive(&self) -> Result<Option<Inbound>, <Self as Dispatcher>::Error>;

            async fn transmit(&self, message: OutboundMessage) -> Result<TransmitResult, <Self as Dispatcher>::Error>;

            async fn emit_event(&self, event: EmittedEvent) -> Result<(), <Self as Dispatcher>::Error>;

            async fn publish_features(&self, directive: &str, features: &Features) -> Result<(), <Self as Dispatcher>::Error>;

            async fn deregister(&self, directive: &str) -> Result<(), <Self as Dispatcher>::Error>;
        }
    }

    mock! {
        pub TestHandler {}

        #[async_trait]
        impl WorkerHandler for TestHandler {
            async fn on_receive(&mut self, item: WorkItem) -> WorkerResult<()>;
            async fn on_cancel(&mut self, cancel_id: &str) -> WorkerResult<()>;
            async fn on_event(&mut self, event: DispatcherEvent) -> WorkerResult<()>;
            async fn on_disconnect(&mut self) -> WorkerResult<()>;
        }
    }
}
