use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{UnknownDispatcherEventSnafu, WorkerError};
use crate::metadata::Metadata;

/// Signals a worker emits to describe its operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// The worker accepted a work item and is beginning to work on it
    Begin = 1,
    /// The worker is done with a work item
    End = 2,
    /// The worker is busy with a work item
    Working = 3,
}

impl WorkerEvent {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("BEGIN"),
            Self::End => f.write_str("END"),
            Self::Working => f.write_str("WORKING"),
        }
    }
}

/// Events the dispatcher broadcasts when its connection state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatcherEvent {
    ReceivedDisconnect = 1,
    UnexpectedDisconnect = 2,
    ConnectionRestored = 3,
}

impl DispatcherEvent {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for DispatcherEvent {
    type Error = WorkerError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::ReceivedDisconnect),
            2 => Ok(Self::UnexpectedDisconnect),
            3 => Ok(Self::ConnectionRestored),
            _ => UnknownDispatcherEventSnafu { code }.fail(),
        }
    }
}

impl fmt::Display for DispatcherEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReceivedDisconnect => f.write_str("RECEIVED_DISCONNECT"),
            Self::UnexpectedDisconnect => f.write_str("UNEXPECTED_DISCONNECT"),
            Self::ConnectionRestored => f.write_str("CONNECTION_RESTORED"),
        }
    }
}

/// A [`WorkerEvent`] as handed to the dispatcher, tied to the work item it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub event: WorkerEvent,
    pub message_id: String,
    pub response_to: Option<String>,
    pub data: Metadata,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatcher_event_codes_map_both_ways() {
        for event in [
            DispatcherEvent::ReceivedDisconnect,
            DispatcherEvent::UnexpectedDisconnect,
            DispatcherEvent::ConnectionRestored,
        ] {
            assert_eq!(DispatcherEvent::try_from(event.code()).unwrap(), event);
        }
    }

    #[test]
    fn unknown_dispatcher_event_codes_are_rejected() {
        assert!(matches!(
            DispatcherEvent::try_from(0),
            Err(WorkerError::UnknownDispatcherEvent { code: 0 })
        ));
        assert!(matches!(
            DispatcherEvent::try_from(4),
            Err(WorkerError::UnknownDispatcherEvent { code: 4 })
        ));
    }

    #[test]
    fn worker_event_codes() {
        assert_eq!(WorkerEvent::Begin.code(), 1);
        assert_eq!(WorkerEvent::End.code(), 2);
        assert_eq!(WorkerEvent::Working.code(), 3);
        assert_eq!(WorkerEvent::Working.to_string(), "WORKING");
    }
}
