use std::borrow::Cow;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::Metadata;

/// One unit of inbound data delivered by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct WorkItem {
    /// Address the echo is sent back to
    pub address: String,
    /// Unique id of the item while it is in flight
    pub id: String,
    #[builder(default, setter(into, strip_option))]
    pub response_to: Option<String>,
    #[builder(default)]
    pub metadata: Metadata,
    #[builder(default)]
    pub payload: Vec<u8>,
}

impl WorkItem {
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// A message handed to the dispatcher for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub address: String,
    pub message_id: String,
    pub response_to: Option<String>,
    pub metadata: Metadata,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Echoes `item` back to its address under a freshly generated message id, correlated to the item's id.
    pub fn echo_of(item: &WorkItem) -> Self {
        Self {
            address: item.address.clone(),
            message_id: Uuid::new_v4().to_string(),
            response_to: Some(item.id.clone()),
            metadata: item.metadata.clone(),
            payload: item.payload.clone(),
        }
    }
}

/// What the dispatcher answered to a transmit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitResult {
    pub response_code: i32,
    pub response_metadata: Metadata,
    pub response_data: Vec<u8>,
}

impl TransmitResult {
    pub fn new(response_code: i32, response_metadata: Metadata, response_data: Vec<u8>) -> Self {
        Self {
            response_code,
            response_metadata,
            response_data,
        }
    }

    /// Negative response codes are failures.
    pub fn success(&self) -> bool {
        self.response_code >= 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_defaults_optional_fields() {
        let item = WorkItemBuilder::default()
            .address("echo")
            .id("a")
            .build()
            .unwrap();
        assert_eq!(item.response_to, None);
        assert!(item.metadata.is_empty());
        assert!(item.payload.is_empty());
    }

    #[test]
    fn builder_requires_an_id() {
        assert!(WorkItemBuilder::default().address("echo").build().is_err());
    }

    #[test]
    fn echo_of_correlates_to_the_item() {
        let mut metadata = Metadata::new();
        metadata.set("key", "value");
        let item = WorkItemBuilder::default()
            .address("echo")
            .id("a")
            .response_to("origin")
            .metadata(metadata.clone())
            .payload("hi")
            .build()
            .unwrap();

        let first = OutboundMessage::echo_of(&item);
        let second = OutboundMessage::echo_of(&item);

        assert_eq!(first.address, "echo");
        assert_eq!(first.response_to.as_deref(), Some("a"));
        assert_eq!(first.metadata, metadata);
        assert_eq!(first.payload, b"hi".to_vec());
        assert_ne!(first.message_id, item.id);
        assert_ne!(first.message_id, second.message_id);
    }

    #[test]
    fn payload_text_is_lossy() {
        let item = WorkItemBuilder::default()
            .address("echo")
            .id("a")
            .payload(vec![b'h', 0xff, b'i'])
            .build()
            .unwrap();
        assert_eq!(item.payload_text(), "h\u{fffd}i");
    }

    #[test]
    fn negative_response_codes_are_failures() {
        assert!(TransmitResult::new(0, Metadata::new(), vec![]).success());
        assert!(TransmitResult::new(200, Metadata::new(), vec![]).success());
        assert!(!TransmitResult::new(-1, Metadata::new(), vec![]).success());
    }
}
