use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::correlation::CorrelationId;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Routing metadata attached to every published command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    pub reply_to: String,
    pub correlation_id: CorrelationId,
    pub content_type: String,
}

/// A command ready for the wire: routed directly to the agent's queue on the
/// default exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub properties: MessageProperties,
}

impl OutboundMessage {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.properties.correlation_id
    }
}

/// An acknowledgement delivered to the reply queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundReply {
    pub correlation_id: Option<CorrelationId>,
    pub body: Value,
    pub received_at: DateTime<Utc>,
}
