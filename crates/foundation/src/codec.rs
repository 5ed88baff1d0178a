//! Wire codec for commands and acknowledgements.
//!
//! Commands go out as their JSON body, unmodified, routed by agent id with
//! `reply_to`, `correlation_id` and `content_type` attached. Replies come back
//! as arbitrary bytes; anything that is not JSON is kept as a string so the
//! correlation id can still resolve the tracked request.

use chrono::Utc;
use serde_json::Value;

use crate::models::{
    Command, CorrelationId, InboundReply, MessageProperties, OutboundMessage, JSON_CONTENT_TYPE,
};
use crate::{DispatchError, DispatchResult};

pub struct WireCodec;

impl WireCodec {
    pub fn encode_body(command: &Command) -> DispatchResult<Vec<u8>> {
        serde_json::to_vec(command)
            .map_err(|e| DispatchError::Serialization(format!("序列化命令失败: {e}")))
    }

    pub fn envelope(
        destination: &str,
        reply_to: &str,
        correlation_id: &CorrelationId,
        payload: Vec<u8>,
    ) -> OutboundMessage {
        OutboundMessage {
            routing_key: destination.to_string(),
            payload,
            properties: MessageProperties {
                reply_to: reply_to.to_string(),
                correlation_id: correlation_id.clone(),
                content_type: JSON_CONTENT_TYPE.to_string(),
            },
        }
    }

    pub fn encode(
        command: &Command,
        destination: &str,
        reply_to: &str,
        correlation_id: &CorrelationId,
    ) -> DispatchResult<OutboundMessage> {
        let payload = Self::encode_body(command)?;
        Ok(Self::envelope(destination, reply_to, correlation_id, payload))
    }

    pub fn decode_reply(correlation_id: Option<&str>, data: &[u8]) -> InboundReply {
        let body = serde_json::from_slice(data)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(data).into_owned()));

        InboundReply {
            correlation_id: correlation_id.map(CorrelationId::from_raw),
            body,
            received_at: Utc::now(),
        }
    }
}
