use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use aurora_config::{AppConfig, ConfigValidator};
use aurora_dispatcher::{
    DispatchOutcome, Dispatcher, DispatcherCollaborators, LoggingTimeoutHandler,
};
use aurora_foundation::{Command, InboundReply, ResponseHandler};
use aurora_infrastructure::{AmqpTransport, FileReplyQueueRegistry, StaticDestinationDirectory};

const SEND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 单次发送的命令
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub command: Command,
    pub destination: String,
    pub request_id: Option<String>,
}

/// 应用运行模式
#[derive(Debug, Clone)]
pub enum AppMode {
    /// 保持连接直到收到关闭信号
    Serve,
    /// 发送一条命令，等待确认或超时后退出
    Send(SendRequest),
}

/// 把收到的确认写入日志
struct ReplyLogger;

#[async_trait]
impl ResponseHandler for ReplyLogger {
    async fn on_response(&self, reply: InboundReply) {
        match &reply.correlation_id {
            Some(id) => info!("收到 {} 的确认: {}", id, reply.body),
            None => info!("收到无关联ID的回复: {}", reply.body),
        }
    }
}

/// 主应用程序
pub struct Application {
    dispatcher: Arc<Dispatcher>,
}

impl Application {
    /// 使用 RabbitMQ 和配置文件中的接入点列表创建应用
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("配置验证失败")?;

        let collaborators = DispatcherCollaborators {
            transport: Arc::new(AmqpTransport::new()),
            directory: Arc::new(StaticDestinationDirectory::from_config(&config.directory)),
            registry: Arc::new(FileReplyQueueRegistry::from_config(&config.broker)),
            timeout_handler: Arc::new(LoggingTimeoutHandler),
            response_handler: Some(Arc::new(ReplyLogger)),
        };

        Ok(Self::with_collaborators(&config, collaborators))
    }

    pub fn with_collaborators(config: &AppConfig, collaborators: DispatcherCollaborators) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config, collaborators)),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// 运行应用程序，结束前总是有序关闭分发器
    pub async fn run(&self, mode: AppMode, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", mode);

        let result = self.run_mode(mode, &mut shutdown_rx).await;

        self.dispatcher
            .stop()
            .await
            .context("关闭分发器失败")?;
        result
    }

    async fn run_mode(
        &self,
        mode: AppMode,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let started = tokio::select! {
            result = self.dispatcher.start() => Some(result),
            _ = shutdown_rx.recv() => None,
        };
        match started {
            Some(result) => {
                result.context("启动分发器失败")?;
            }
            None => {
                info!("启动完成前收到关闭信号");
                return Ok(());
            }
        }

        match mode {
            AppMode::Serve => {
                info!("分发器运行中，等待关闭信号");
                let _ = shutdown_rx.recv().await;
                Ok(())
            }
            AppMode::Send(request) => self.send_once(request, shutdown_rx).await,
        }
    }

    async fn send_once(
        &self,
        request: SendRequest,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let outcome = self
            .dispatcher
            .dispatch(
                &request.command,
                &request.destination,
                request.request_id.as_deref(),
            )
            .await
            .with_context(|| format!("发送命令到 {} 失败", request.destination))?;

        let correlation_id = match outcome {
            DispatchOutcome::Tracked(handle) => handle.correlation_id().clone(),
            DispatchOutcome::ConnectionReset { correlation_id } => {
                warn!("发送 {} 时连接被重置，命令未送达", correlation_id);
                return Err(anyhow::anyhow!("连接被重置，命令未送达: {correlation_id}"));
            }
        };

        info!("命令已发送，等待 {} 的确认", correlation_id);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("等待确认时收到关闭信号");
                    return Ok(());
                }
                _ = tokio::time::sleep(SEND_POLL_INTERVAL) => {
                    if self.dispatcher.tracker().lookup(&correlation_id).await.is_none() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
