use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use aurora_foundation::{InboundReply, ResponseHandler};

use crate::tracker::RequestTracker;

/// 根据回复队列上的确认解除对应请求的计时，再交给下游处理器
pub struct ResolvingResponseHandler {
    tracker: Arc<RequestTracker>,
    downstream: Option<Arc<dyn ResponseHandler>>,
}

impl ResolvingResponseHandler {
    pub fn new(tracker: Arc<RequestTracker>, downstream: Option<Arc<dyn ResponseHandler>>) -> Self {
        Self {
            tracker,
            downstream,
        }
    }
}

#[async_trait]
impl ResponseHandler for ResolvingResponseHandler {
    async fn on_response(&self, reply: InboundReply) {
        match &reply.correlation_id {
            Some(correlation_id) => {
                if self.tracker.cancel_one(correlation_id).await {
                    debug!("请求 {} 已确认", correlation_id);
                } else {
                    warn!("{} 的回复没有对应的在途请求（已超时或重复）", correlation_id);
                }
            }
            None => warn!("回复缺少关联ID，跳过请求匹配"),
        }

        if let Some(downstream) = &self.downstream {
            downstream.on_response(reply).await;
        }
    }
}
