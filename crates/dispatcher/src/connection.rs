use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aurora_config::models::{BrokerConfig, DispatcherConfig};
use aurora_foundation::{
    BrokerChannel, BrokerSession, BrokerTransport, DispatchError, DispatchResult,
    ReplyQueueRegistry, ResponseHandler,
};

use crate::tracker::RequestTracker;

/// 连接生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Uninitialized => "UNINITIALIZED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        };
        write!(f, "{s}")
    }
}

/// `open` 的结果：首次连接需要执行上线通知等启动动作，重连不需要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    Initial,
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// 主动关闭，释放会话并进入 Closed 状态
    Shutdown,
    /// 故障恢复，保留会话记录供重建流程等待其关闭
    Recovery,
}

/// 关闭标志，置位期间新的分发请求立即失败
#[derive(Debug, Clone, Default)]
pub struct CloseGuard(Arc<AtomicBool>);

impl CloseGuard {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 已完全建立的连接、通道和回复队列
#[derive(Clone)]
pub struct LiveSession {
    pub generation: u64,
    pub connection: Arc<dyn BrokerSession>,
    pub channel: Arc<dyn BrokerChannel>,
    pub reply_queue: String,
}

impl LiveSession {
    pub fn is_healthy(&self) -> bool {
        self.connection.is_open() && self.channel.is_open()
    }
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("generation", &self.generation)
            .field("reply_queue", &self.reply_queue)
            .field("connection_open", &self.connection.is_open())
            .field("channel_open", &self.channel.is_open())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub open_poll_interval: Duration,
    pub close_poll_interval: Duration,
    pub reconnect_interval: Duration,
    pub wait_timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn from_config(broker: &BrokerConfig, dispatcher: &DispatcherConfig) -> Self {
        Self {
            url: broker.url.clone(),
            open_poll_interval: dispatcher.open_poll_interval(),
            close_poll_interval: dispatcher.close_poll_interval(),
            reconnect_interval: dispatcher.reconnect_interval(),
            wait_timeout: dispatcher.wait_timeout(),
        }
    }
}

/// 管理唯一的代理连接及其通道
///
/// `open`、`close`、`restart` 由生命周期锁串行化，分发锁只用于串行化发布。
/// 会话在连接、通道、回复队列全部就绪后才对外可见。
pub struct ConnectionManager {
    transport: Arc<dyn BrokerTransport>,
    settings: ConnectionSettings,
    registry: Arc<dyn ReplyQueueRegistry>,
    response_handler: Arc<dyn ResponseHandler>,
    tracker: Arc<RequestTracker>,
    session: RwLock<Option<LiveSession>>,
    state: watch::Sender<ConnectionState>,
    restarting: AtomicBool,
    close_guard: CloseGuard,
    lifecycle: Mutex<()>,
    dispatch_lock: Mutex<()>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        settings: ConnectionSettings,
        registry: Arc<dyn ReplyQueueRegistry>,
        response_handler: Arc<dyn ResponseHandler>,
        tracker: Arc<RequestTracker>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            transport,
            settings,
            registry,
            response_handler,
            tracker,
            session: RwLock::new(None),
            state,
            restarting: AtomicBool::new(false),
            close_guard: CloseGuard::default(),
            lifecycle: Mutex::new(()),
            dispatch_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn close_guard(&self) -> &CloseGuard {
        &self.close_guard
    }

    pub fn dispatch_lock(&self) -> &Mutex<()> {
        &self.dispatch_lock
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn reply_queue(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.reply_queue.clone())
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("连接状态变更: {} -> {}", previous, next);
        }
    }

    /// 连接和通道是否都处于打开状态，尚未建立视为不健康
    pub async fn is_healthy(&self) -> bool {
        self.healthy_session().await.is_some()
    }

    pub async fn healthy_session(&self) -> Option<LiveSession> {
        self.session
            .read()
            .await
            .as_ref()
            .filter(|session| session.is_healthy())
            .cloned()
    }

    pub async fn open(&self) -> DispatchResult<OpenKind> {
        let _lifecycle = self.lifecycle.lock().await;
        self.open_locked().await
    }

    async fn open_locked(&self) -> DispatchResult<OpenKind> {
        if self.is_shutting_down() {
            return Err(DispatchError::connection_error("连接管理器已关闭"));
        }

        let previous = self.session.write().await.take();
        if let Some(previous) = previous.filter(|p| !p.connection.is_closed()) {
            info!("关闭仍处于打开状态的第 {} 代连接", previous.generation);
            if let Err(e) = previous.connection.close().await {
                warn!("关闭旧连接失败: {}", e);
            }
        }

        self.set_state(ConnectionState::Connecting);
        info!("正在连接消息代理");

        let (connection, channel, reply_queue) = self.establish().await?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = LiveSession {
            generation,
            connection,
            channel,
            reply_queue: reply_queue.clone(),
        };
        *self.session.write().await = Some(session);

        self.close_guard.clear();
        self.set_state(ConnectionState::Open);
        info!("连接已建立 (第 {} 代, 回复队列: {})", generation, reply_queue);

        if let Err(e) = self.registry.publish_reply_queue_name(&reply_queue).await {
            warn!("发布回复队列名称失败: {}", e);
        }

        if generation == 1 {
            Ok(OpenKind::Initial)
        } else {
            Ok(OpenKind::Reconnect)
        }
    }

    async fn establish(
        &self,
    ) -> DispatchResult<(Arc<dyn BrokerSession>, Arc<dyn BrokerChannel>, String)> {
        let connection = self.transport.connect(&self.settings.url).await?;

        let ready = async {
            let channel = connection.open_channel().await?;
            let reply_queue = channel.declare_reply_queue().await?;
            channel
                .consume_replies(&reply_queue, Arc::clone(&self.response_handler))
                .await?;
            Ok::<_, DispatchError>((channel, reply_queue))
        };

        match ready.await {
            Ok((channel, reply_queue)) => Ok((connection, channel, reply_queue)),
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("关闭未完成的连接失败: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// 反复尝试 `open` 直到成功，或 `stop` 被取消
    pub async fn open_until_ready(&self, stop: &CancellationToken) -> DispatchResult<OpenKind> {
        loop {
            match self.open().await {
                Ok(kind) => return Ok(kind),
                Err(e) => {
                    warn!(
                        "连接消息代理失败，{:?} 后重试: {}",
                        self.settings.reconnect_interval, e
                    );
                    self.pause(stop, self.settings.reconnect_interval).await?;
                }
            }
        }
    }

    pub async fn close(&self, reason: CloseReason) -> DispatchResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.close_locked(reason).await
    }

    async fn close_locked(&self, reason: CloseReason) -> DispatchResult<()> {
        self.close_guard.set();

        let cancelled = self.tracker.cancel_all().await;
        if cancelled > 0 {
            info!("关闭连接，取消 {} 个在途请求", cancelled);
        }

        let current = self.session.read().await.clone();
        let session = match current {
            Some(session) if !session.connection.is_closed() => session,
            _ => {
                debug!("连接已关闭，忽略关闭请求");
                if reason == CloseReason::Shutdown {
                    self.session.write().await.take();
                    self.set_state(ConnectionState::Closed);
                }
                return Ok(());
            }
        };

        self.set_state(ConnectionState::Closing);
        info!("关闭连接 (第 {} 代, 原因: {:?})", session.generation, reason);

        if let Err(e) = session.connection.close().await {
            warn!("请求关闭连接失败: {}", e);
        }

        if reason == CloseReason::Shutdown {
            self.session.write().await.take();
            self.set_state(ConnectionState::Closed);
        }

        Ok(())
    }

    /// 分发发现通道不可用时调用；会话已被替换或正在重建时忽略
    pub async fn force_close(&self, generation: u64) -> DispatchResult<()> {
        if self.is_restarting() {
            debug!("连接正在重建，忽略强制关闭");
            return Ok(());
        }

        let _lifecycle = self.lifecycle.lock().await;
        let current = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.generation);

        if current != Some(generation) {
            debug!("第 {} 代连接已被替换，忽略强制关闭", generation);
            return Ok(());
        }

        warn!("强制关闭第 {} 代连接，等待健康监控重建", generation);
        self.close_locked(CloseReason::Recovery).await
    }

    /// 完整恢复流程：关闭、等待关闭完成、重新打开、等待就绪
    pub async fn restart(&self, stop: &CancellationToken) -> DispatchResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.restarting.store(true, Ordering::SeqCst);
        let result = self.restart_locked(stop).await;
        self.restarting.store(false, Ordering::SeqCst);
        result
    }

    async fn restart_locked(&self, stop: &CancellationToken) -> DispatchResult<()> {
        info!("开始重建连接");

        let previous = self.session.read().await.clone();
        self.close_locked(CloseReason::Recovery).await?;
        if let Some(previous) = previous {
            self.wait_until_closed(&previous, stop).await?;
        }
        self.set_state(ConnectionState::Closed);

        loop {
            match self.open_locked().await {
                Ok(_) => break,
                Err(e) => {
                    warn!(
                        "重建连接失败，{:?} 后重试: {}",
                        self.settings.reconnect_interval, e
                    );
                    self.pause(stop, self.settings.reconnect_interval).await?;
                }
            }
        }

        self.wait_until_healthy(stop).await?;
        info!("连接重建完成");
        Ok(())
    }

    /// 轮询直到旧连接报告已关闭
    pub async fn wait_until_closed(
        &self,
        session: &LiveSession,
        stop: &CancellationToken,
    ) -> DispatchResult<()> {
        while !session.connection.is_closed() {
            debug!("等待第 {} 代连接关闭", session.generation);
            self.pause(stop, self.settings.close_poll_interval).await?;
        }
        Ok(())
    }

    async fn wait_until_healthy(&self, stop: &CancellationToken) -> DispatchResult<()> {
        let mut changes = self.state.subscribe();
        while !self.is_healthy().await {
            tokio::select! {
                _ = stop.cancelled() => return Err(DispatchError::OperatorAbort),
                _ = changes.changed() => {}
                _ = tokio::time::sleep(self.settings.open_poll_interval) => {}
            }
        }
        Ok(())
    }

    /// 阻塞直到连接和通道都可用
    ///
    /// `abort` 被取消时返回 `OperatorAbort`；进入关闭流程时返回
    /// `SendWhileClosing`；配置了等待上限时超时返回 `WaitTimeout`。
    pub async fn wait_until_open(
        &self,
        destination: &str,
        abort: &CancellationToken,
    ) -> DispatchResult<LiveSession> {
        let wait = async {
            let mut changes = self.state.subscribe();
            loop {
                if let Some(session) = self.healthy_session().await {
                    return Ok(session);
                }
                debug!("等待连接可用以发送到 {}", destination);
                tokio::select! {
                    _ = abort.cancelled() => return Err(DispatchError::OperatorAbort),
                    _ = self.shutdown.cancelled() => {
                        return Err(DispatchError::send_while_closing(destination));
                    }
                    _ = changes.changed() => {}
                    _ = tokio::time::sleep(self.settings.open_poll_interval) => {}
                }
            }
        };

        match self.settings.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                DispatchError::WaitTimeout(format!("等待连接可用超过 {limit:?}: {destination}"))
            })?,
            None => wait.await,
        }
    }

    /// 进入关闭流程：置位关闭标志并唤醒所有等待连接的分发调用
    pub fn begin_shutdown(&self) {
        self.close_guard.set();
        self.shutdown.cancel();
    }

    async fn pause(&self, stop: &CancellationToken, interval: Duration) -> DispatchResult<()> {
        tokio::select! {
            _ = stop.cancelled() => Err(DispatchError::OperatorAbort),
            _ = self.shutdown.cancelled() => Err(DispatchError::OperatorAbort),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }
}
