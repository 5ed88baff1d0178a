use async_trait::async_trait;

use crate::models::{CorrelationId, GroupKey, InboundReply};
use crate::DispatchResult;

/// 请求截止时间到达时调用，运行在计时任务上，不应长时间阻塞
#[async_trait]
pub trait TimeoutHandler: Send + Sync {
    async fn on_request_timeout(
        &self,
        group_key: &GroupKey,
        destination: &str,
        correlation_id: &CorrelationId,
    );
}

/// 处理回复队列上收到的确认消息
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn on_response(&self, reply: InboundReply);
}

/// 已知接入点列表，首次连接时用于发送上线通知
#[async_trait]
pub trait DestinationDirectory: Send + Sync {
    async fn list_known_destinations(&self) -> DispatchResult<Vec<String>>;
}

/// 回复队列声明后通知其他组件队列名称
#[async_trait]
pub trait ReplyQueueRegistry: Send + Sync {
    async fn publish_reply_queue_name(&self, name: &str) -> DispatchResult<()>;
}
