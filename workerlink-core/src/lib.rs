//! Worker-side session and cancellation core.
//!
//! A worker registers with an external dispatcher under a directive, receives work items, and echoes each item back
//! after an optional delay and repeat count. In-flight work can be cancelled cooperatively: a cancel request is observed
//! at the next tick boundary, never in the middle of a transmit.
//!
//! The dispatcher and the timer facility are both external collaborators, expressed here as the [`Dispatcher`] and
//! [`Scheduler`] traits. [`InProcessDispatcher`] and [`TokioScheduler`] are the implementations shipped with the crate.
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

pub mod cancellation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod features;
pub mod handler;
pub mod message;
pub mod metadata;
pub mod scheduler;
pub mod session;
pub mod task;

pub use cancellation::CancellationTable;
pub use dispatcher::{Dispatcher, Inbound, InProcessDispatcher, Registration};
pub use error::{WorkerError, WorkerResult};
pub use event::{DispatcherEvent, EmittedEvent, WorkerEvent};
pub use features::{Features, UPDATED_AT};
pub use handler::WorkerHandler;
pub use message::{OutboundMessage, TransmitResult, WorkItem, WorkItemBuilder};
pub use metadata::Metadata;
pub use scheduler::{ScheduleHandle, Scheduler, SchedulerError, TokioScheduler};
pub use session::{Session, SessionConfig, SessionEvent, TransmitCompletion};
pub use task::{EchoTask, RemovalReason, TaskEvent, TaskState};
