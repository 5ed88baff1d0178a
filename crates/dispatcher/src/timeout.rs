use async_trait::async_trait;
use tracing::warn;

use aurora_foundation::{CorrelationId, GroupKey, TimeoutHandler};

/// 默认超时处理：只记录日志
#[derive(Debug, Default, Clone)]
pub struct LoggingTimeoutHandler;

#[async_trait]
impl TimeoutHandler for LoggingTimeoutHandler {
    async fn on_request_timeout(
        &self,
        group_key: &GroupKey,
        destination: &str,
        correlation_id: &CorrelationId,
    ) {
        warn!(
            group = %group_key,
            destination = destination,
            correlation_id = %correlation_id,
            "接入点未在截止时间内确认请求"
        );
    }
}
