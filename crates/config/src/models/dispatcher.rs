use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 请求确认的截止时间（秒）
    pub request_timeout_seconds: u64,
    /// 健康监控探测间隔（毫秒）
    pub health_check_interval_ms: u64,
    /// 分发时等待通道打开的轮询间隔（毫秒）
    pub open_poll_interval_ms: u64,
    /// 重启时等待旧连接关闭的轮询间隔（毫秒）
    pub close_poll_interval_ms: u64,
    /// 重新连接失败后的重试间隔（毫秒）
    pub reconnect_interval_ms: u64,
    /// 分发等待通道恢复的上限，None 表示无限等待
    pub wait_timeout_seconds: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            health_check_interval_ms: 500,
            open_poll_interval_ms: 250,
            close_poll_interval_ms: 1000,
            reconnect_interval_ms: 1000,
            wait_timeout_seconds: None,
        }
    }
}

impl DispatcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn open_poll_interval(&self) -> Duration {
        Duration::from_millis(self.open_poll_interval_ms)
    }

    pub fn close_poll_interval(&self) -> Duration {
        Duration::from_millis(self.close_poll_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_seconds.map(Duration::from_secs)
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "dispatcher.request_timeout_seconds",
        )?;
        ValidationUtils::validate_interval_ms(
            self.health_check_interval_ms,
            "dispatcher.health_check_interval_ms",
        )?;
        ValidationUtils::validate_interval_ms(
            self.open_poll_interval_ms,
            "dispatcher.open_poll_interval_ms",
        )?;
        ValidationUtils::validate_interval_ms(
            self.close_poll_interval_ms,
            "dispatcher.close_poll_interval_ms",
        )?;
        ValidationUtils::validate_interval_ms(
            self.reconnect_interval_ms,
            "dispatcher.reconnect_interval_ms",
        )?;
        if let Some(wait_timeout) = self.wait_timeout_seconds {
            ValidationUtils::validate_timeout_seconds(
                wait_timeout,
                "dispatcher.wait_timeout_seconds",
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_default() {
        let config = DispatcherConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_check_interval(), Duration::from_millis(500));
        assert_eq!(config.open_poll_interval(), Duration::from_millis(250));
        assert_eq!(config.close_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.wait_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatcher_config_validation() {
        let mut config = DispatcherConfig::default();
        config.request_timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = DispatcherConfig::default();
        config.health_check_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = DispatcherConfig::default();
        config.wait_timeout_seconds = Some(0);
        assert!(config.validate().is_err());

        let mut config = DispatcherConfig::default();
        config.wait_timeout_seconds = Some(120);
        assert!(config.validate().is_ok());
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(120)));
    }
}
