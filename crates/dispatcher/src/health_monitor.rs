use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aurora_foundation::DispatchError;

use crate::connection::ConnectionManager;

/// 连接健康监控
///
/// 周期性检查连接和通道是否可用，不可用时驱动一次完整重建。
/// 首次连接成功后启动一次，关闭时停止一次。
pub struct HealthMonitor {
    connection: Arc<ConnectionManager>,
    interval: Duration,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    restarts: Arc<AtomicU64>,
}

impl HealthMonitor {
    pub fn new(
        connection: Arc<ConnectionManager>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            connection,
            interval,
            token,
            handle: Mutex::new(None),
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 启动监控循环，重复调用无效
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if handle.is_some() || self.token.is_cancelled() {
            warn!("健康监控已启动或已停止，忽略启动请求");
            return false;
        }

        *handle = Some(tokio::spawn(Self::monitor_loop(
            Arc::clone(&self.connection),
            self.interval,
            self.token.clone(),
            Arc::clone(&self.restarts),
        )));
        true
    }

    /// 发出停止信号并等待循环退出
    pub async fn stop(&self) {
        self.token.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("健康监控任务异常退出: {}", e);
            }
            info!("健康监控已停止");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 已完成的连接重建次数
    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    async fn monitor_loop(
        connection: Arc<ConnectionManager>,
        interval: Duration,
        token: CancellationToken,
        restarts: Arc<AtomicU64>,
    ) {
        info!("启动连接健康监控 (间隔: {:?})", interval);

        while !token.is_cancelled() {
            if !connection.is_healthy().await {
                warn!("检测到连接或通道不可用，开始重建");
                match connection.restart(&token).await {
                    Ok(()) => {
                        let total = restarts.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("连接已恢复 (累计重建 {} 次)", total);
                    }
                    Err(DispatchError::OperatorAbort) => break,
                    Err(e) => error!("重建连接失败: {}", e),
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("收到停止信号，退出健康监控循环");
    }
}
