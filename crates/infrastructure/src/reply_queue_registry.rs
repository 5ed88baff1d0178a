use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use aurora_config::BrokerConfig;
use aurora_foundation::{DispatchError, DispatchResult, ReplyQueueRegistry};

/// 写入注册文件的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyQueueRecord {
    pub reply_queue: String,
    pub updated_at: DateTime<Utc>,
}

/// 把当前回复队列名称写入 JSON 文件，供其他组件读取
pub struct FileReplyQueueRegistry {
    path: PathBuf,
}

impl FileReplyQueueRegistry {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(&config.reply_queue_registry_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取最近一次发布的记录，文件不存在时返回 None
    pub async fn read_current(&self) -> DispatchResult<Option<ReplyQueueRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DispatchError::Internal(format!(
                "读取回复队列注册文件 {} 失败: {e}",
                self.path.display()
            ))),
        }
    }

    fn io_error(&self, action: &str, error: std::io::Error) -> DispatchError {
        DispatchError::Internal(format!(
            "{action} {} 失败: {error}",
            self.path.display()
        ))
    }
}

#[async_trait]
impl ReplyQueueRegistry for FileReplyQueueRegistry {
    async fn publish_reply_queue_name(&self, name: &str) -> DispatchResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("创建目录", e))?;
        }

        let record = ReplyQueueRecord {
            reply_queue: name.to_string(),
            updated_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&record)?;

        // 先写临时文件再重命名，读取方不会看到写了一半的内容
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| self.io_error("写入", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error("替换", e))?;

        info!("回复队列名称已写入 {}: {}", self.path.display(), name);
        Ok(())
    }
}
