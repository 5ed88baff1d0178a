use std::sync::Arc;

use async_trait::async_trait;

use crate::models::OutboundMessage;
use crate::traits::collaborators::ResponseHandler;
use crate::DispatchResult;

/// Opens broker connections. One transport serves every reconnect of a
/// dispatcher.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn connect(&self, url: &str) -> DispatchResult<Arc<dyn BrokerSession>>;
}

/// A single broker connection.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    fn is_open(&self) -> bool;

    fn is_closed(&self) -> bool;

    async fn open_channel(&self) -> DispatchResult<Arc<dyn BrokerChannel>>;

    /// Request shutdown. Completion is observed through `is_closed`.
    async fn close(&self) -> DispatchResult<()>;
}

/// A channel on a `BrokerSession`.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn is_open(&self) -> bool;

    /// Declare a durable, server-named reply queue and return its name.
    async fn declare_reply_queue(&self) -> DispatchResult<String>;

    /// Deliver every message arriving on `queue` to `handler`.
    async fn consume_replies(
        &self,
        queue: &str,
        handler: Arc<dyn ResponseHandler>,
    ) -> DispatchResult<()>;

    /// Publish one message. Implementations must report an unusable channel
    /// as `DispatchError::ChannelUnavailable` and anything else as another
    /// variant.
    async fn publish(&self, message: &OutboundMessage) -> DispatchResult<()>;
}
