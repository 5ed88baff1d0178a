#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_dispatch_error_display() {
        let closing = DispatchError::send_while_closing("ap1");
        assert_eq!(closing.to_string(), "连接关闭期间尝试发送消息: ap1");

        let channel = DispatchError::ChannelUnavailable("channel closed".to_string());
        assert_eq!(channel.to_string(), "通道不可用: channel closed");

        let unexpected = DispatchError::UnexpectedDispatch("frame too large".to_string());
        assert_eq!(unexpected.to_string(), "分发失败: frame too large");

        assert_eq!(DispatchError::OperatorAbort.to_string(), "操作被中止");

        let invalid = DispatchError::invalid_command("not an object");
        assert_eq!(invalid.to_string(), "无效的命令: not an object");
    }

    #[test]
    fn test_error_classification() {
        assert!(DispatchError::channel_unavailable("x").is_retryable());
        assert!(DispatchError::connection_error("refused").is_retryable());
        assert!(!DispatchError::OperatorAbort.is_retryable());
        assert!(!DispatchError::send_while_closing("ap1").is_retryable());

        assert!(DispatchError::config_error("bad url").is_fatal());
        assert!(DispatchError::Internal("boom".to_string()).is_fatal());
        assert!(!DispatchError::UnexpectedDispatch("x".to_string()).is_fatal());
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            DispatchError::send_while_closing("ap1").user_message(),
            "连接正在关闭，请稍后重试"
        );
        assert_eq!(
            DispatchError::Serialization("x".to_string()).user_message(),
            "系统繁忙，请稍后重试"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let dispatch_err: DispatchError = err.into();
        assert!(matches!(dispatch_err, DispatchError::Serialization(_)));
    }

    #[test]
    fn test_from_anyhow_error() {
        let dispatch_err: DispatchError = anyhow::anyhow!("wrapped").into();
        match dispatch_err {
            DispatchError::Internal(msg) => assert_eq!(msg, "wrapped"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
