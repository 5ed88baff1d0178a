use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use aurora_config::AppConfig;
use aurora_foundation::{
    BrokerTransport, Command, CorrelationId, DestinationDirectory, DispatchError, DispatchResult,
    ReplyQueueRegistry, ResponseHandler, TimeoutHandler, WireCodec,
};

use crate::connection::{
    CloseReason, ConnectionManager, ConnectionSettings, ConnectionState, LiveSession, OpenKind,
};
use crate::health_monitor::HealthMonitor;
use crate::response::ResolvingResponseHandler;
use crate::tracker::{RequestTracker, TimerHandle};

/// 分发器依赖的外部组件
pub struct DispatcherCollaborators {
    pub transport: Arc<dyn BrokerTransport>,
    pub directory: Arc<dyn DestinationDirectory>,
    pub registry: Arc<dyn ReplyQueueRegistry>,
    pub timeout_handler: Arc<dyn TimeoutHandler>,
    /// 请求确认后额外接收回复的处理器
    pub response_handler: Option<Arc<dyn ResponseHandler>>,
}

/// 一次分发的结果
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// 已发布并开始跟踪
    Tracked(TimerHandle),
    /// 通道不可用，连接已被强制关闭等待重建，请求未被跟踪
    ConnectionReset { correlation_id: CorrelationId },
}

impl DispatchOutcome {
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            DispatchOutcome::Tracked(handle) => handle.correlation_id(),
            DispatchOutcome::ConnectionReset { correlation_id } => correlation_id,
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, DispatchOutcome::Tracked(_))
    }
}

/// 分发引擎
///
/// 组合连接管理、健康监控和请求跟踪。并发调用 `dispatch` 时，
/// 从等待连接到发布再到登记跟踪的整个过程由分发锁串行化。
pub struct Dispatcher {
    connection: Arc<ConnectionManager>,
    tracker: Arc<RequestTracker>,
    monitor: HealthMonitor,
    directory: Arc<dyn DestinationDirectory>,
    timeout_handler: Arc<dyn TimeoutHandler>,
    request_timeout: Duration,
    stop_token: CancellationToken,
    never_abort: CancellationToken,
    started: AtomicBool,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, collaborators: DispatcherCollaborators) -> Self {
        let tracker = Arc::new(RequestTracker::new());
        let resolver: Arc<dyn ResponseHandler> = Arc::new(ResolvingResponseHandler::new(
            Arc::clone(&tracker),
            collaborators.response_handler,
        ));

        let connection = Arc::new(ConnectionManager::new(
            collaborators.transport,
            ConnectionSettings::from_config(&config.broker, &config.dispatcher),
            collaborators.registry,
            resolver,
            Arc::clone(&tracker),
        ));

        let stop_token = CancellationToken::new();
        let monitor = HealthMonitor::new(
            Arc::clone(&connection),
            config.dispatcher.health_check_interval(),
            stop_token.child_token(),
        );

        Self {
            connection,
            tracker,
            monitor,
            directory: collaborators.directory,
            timeout_handler: collaborators.timeout_handler,
            request_timeout: config.dispatcher.request_timeout(),
            stop_token,
            never_abort: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// 建立首次连接；首次成功时启动健康监控并向所有已知接入点发送上线通知
    ///
    /// 只有第一次调用会建立连接，之后的调用返回 `OpenKind::Reconnect`。
    pub async fn start(&self) -> DispatchResult<OpenKind> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("分发器已经启动，忽略重复启动");
            return Ok(OpenKind::Reconnect);
        }

        info!("启动分发器");
        let kind = self.connection.open_until_ready(&self.stop_token).await?;

        if kind == OpenKind::Initial {
            self.monitor.start().await;
            let announced = self.announce_presence().await?;
            info!("分发器已启动，已向 {} 个接入点发送上线通知", announced);
        }

        Ok(kind)
    }

    /// 向目录中的每个接入点发送 SYN，单个失败不影响其他接入点
    pub async fn announce_presence(&self) -> DispatchResult<usize> {
        let destinations = self.directory.list_known_destinations().await?;
        let syn = Command::syn();
        let mut announced = 0;

        for destination in &destinations {
            match self.dispatch(&syn, destination, None).await {
                Ok(DispatchOutcome::Tracked(_)) => announced += 1,
                Ok(DispatchOutcome::ConnectionReset { correlation_id }) => {
                    warn!("向 {} 发送上线通知时连接被重置 ({})", destination, correlation_id);
                }
                Err(e) => warn!("向 {} 发送上线通知失败: {}", destination, e),
            }
        }

        Ok(announced)
    }

    pub async fn dispatch(
        &self,
        command: &Command,
        destination: &str,
        request_suffix: Option<&str>,
    ) -> DispatchResult<DispatchOutcome> {
        self.dispatch_with_abort(command, destination, request_suffix, &self.never_abort)
            .await
    }

    /// 分发命令，`abort` 用于中止阻塞等待
    #[instrument(skip(self, command, destination, abort), fields(destination = %destination))]
    pub async fn dispatch_with_abort(
        &self,
        command: &Command,
        destination: &str,
        request_suffix: Option<&str>,
        abort: &CancellationToken,
    ) -> DispatchResult<DispatchOutcome> {
        let correlation_id = CorrelationId::new(destination, request_suffix);
        let payload = WireCodec::encode_body(command)?;

        if self.connection.close_guard().is_set() {
            warn!("连接正在关闭，拒绝发送 {}", correlation_id);
            return Err(DispatchError::send_while_closing(destination));
        }

        let guard = tokio::select! {
            biased;
            _ = abort.cancelled() => return Err(DispatchError::OperatorAbort),
            guard = self.connection.dispatch_lock().lock() => guard,
        };
        debug!("获取分发锁: {}", correlation_id);

        let result = self
            .publish_locked(command, destination, correlation_id, payload, abort)
            .await;

        drop(guard);
        debug!("释放分发锁");
        result
    }

    async fn publish_locked(
        &self,
        command: &Command,
        destination: &str,
        correlation_id: CorrelationId,
        payload: Vec<u8>,
        abort: &CancellationToken,
    ) -> DispatchResult<DispatchOutcome> {
        if self.connection.close_guard().is_set() {
            warn!("连接正在关闭，拒绝发送 {}", correlation_id);
            return Err(DispatchError::send_while_closing(destination));
        }

        let session = self.connection.wait_until_open(destination, abort).await?;
        let message = WireCodec::envelope(destination, &session.reply_queue, &correlation_id, payload);

        match session.channel.publish(&message).await {
            Ok(()) => {
                let group_key = command.group_key();
                info!("已发送请求 {} (分组: {})", correlation_id, group_key);
                let handle = self
                    .tracker
                    .track(
                        correlation_id,
                        destination,
                        group_key,
                        Arc::clone(&self.timeout_handler),
                        self.request_timeout,
                    )
                    .await;
                Ok(DispatchOutcome::Tracked(handle))
            }
            Err(DispatchError::ChannelUnavailable(reason)) => {
                self.reset_connection(&session, &reason).await;
                Ok(DispatchOutcome::ConnectionReset { correlation_id })
            }
            Err(e) => {
                error!("发送请求 {} 时发生意外错误: {}", correlation_id, e);
                Err(DispatchError::UnexpectedDispatch(e.to_string()))
            }
        }
    }

    async fn reset_connection(&self, session: &LiveSession, reason: &str) {
        warn!("通道不可用，强制关闭连接等待重建: {}", reason);
        if let Err(e) = self.connection.force_close(session.generation).await {
            warn!("强制关闭连接失败: {}", e);
        }
    }

    /// 收到确认时取消对应请求的计时器
    pub async fn resolve(&self, correlation_id: &CorrelationId) -> bool {
        self.tracker.cancel_one(correlation_id).await
    }

    /// 放弃某个接入点的全部在途请求，之后不会再为它们触发超时
    pub async fn abandon_destination(&self, destination: &str) -> usize {
        self.tracker.cancel_all_for(destination).await
    }

    /// 有序关闭：停止健康监控，取消所有计时器，关闭连接
    pub async fn stop(&self) -> DispatchResult<()> {
        info!("停止分发器");
        self.stop_token.cancel();
        self.monitor.stop().await;

        self.connection.begin_shutdown();
        let _guard = self.connection.dispatch_lock().lock().await;
        self.connection.close(CloseReason::Shutdown).await?;

        info!("分发器已停止");
        Ok(())
    }
}
