use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("连接关闭期间尝试发送消息: {destination}")]
    SendWhileClosing { destination: String },
    #[error("通道不可用: {0}")]
    ChannelUnavailable(String),
    #[error("分发失败: {0}")]
    UnexpectedDispatch(String),
    #[error("操作被中止")]
    OperatorAbort,
    #[error("等待超时: {0}")]
    WaitTimeout(String),
    #[error("连接错误: {0}")]
    Connection(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("无效的命令: {0}")]
    InvalidCommand(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn send_while_closing<S: Into<String>>(destination: S) -> Self {
        Self::SendWhileClosing {
            destination: destination.into(),
        }
    }
    pub fn channel_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ChannelUnavailable(msg.into())
    }
    pub fn connection_error<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }
    pub fn invalid_command<S: Into<String>>(msg: S) -> Self {
        Self::InvalidCommand(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 仅连接级别的恢复可以自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::ChannelUnavailable(_)
                | DispatchError::Connection(_)
                | DispatchError::WaitTimeout(_)
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::Internal(_) | DispatchError::Configuration(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            DispatchError::SendWhileClosing { .. } => "连接正在关闭，请稍后重试",
            DispatchError::OperatorAbort => "操作已被用户中止",
            DispatchError::InvalidCommand(_) => "命令格式有误",
            DispatchError::WaitTimeout(_) => "等待连接恢复超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
