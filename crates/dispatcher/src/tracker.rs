use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use aurora_foundation::{CorrelationId, GroupKey, TimeoutHandler};

/// 已发布、等待确认的请求
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRequest {
    pub correlation_id: CorrelationId,
    pub destination: String,
    pub group_key: GroupKey,
    pub dispatched_at: DateTime<Utc>,
    pub deadline: Duration,
}

/// 请求截止计时器的句柄
#[derive(Debug, Clone)]
pub struct TimerHandle {
    correlation_id: CorrelationId,
    deadline_at: Instant,
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn deadline_at(&self) -> Instant {
        self.deadline_at
    }

    /// 计时器已触发或已取消
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

struct TrackedEntry {
    request: TrackedRequest,
    seq: u64,
    timer: AbortHandle,
}

type EntryMap = HashMap<CorrelationId, TrackedEntry>;

/// 按关联 ID 跟踪在途请求
///
/// 截止任务与取消操作在同一把锁下移除条目，先移除者生效，
/// 因此每个条目的回调要么触发一次，要么被取消，二者只发生其一。
pub struct RequestTracker {
    entries: Arc<Mutex<EntryMap>>,
    next_seq: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(1),
        }
    }

    /// 跟踪请求并启动截止计时器
    pub async fn track(
        &self,
        correlation_id: CorrelationId,
        destination: &str,
        group_key: GroupKey,
        timeout_handler: Arc<dyn TimeoutHandler>,
        deadline: Duration,
    ) -> TimerHandle {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let deadline_at = Instant::now() + deadline;

        // 持锁期间生成计时任务，任务触发时需要同一把锁，不会早于插入完成
        let mut entries = self.entries.lock().await;

        let task = tokio::spawn(Self::expire_at(
            Arc::clone(&self.entries),
            correlation_id.clone(),
            seq,
            deadline_at,
            timeout_handler,
        ));

        let request = TrackedRequest {
            correlation_id: correlation_id.clone(),
            destination: destination.to_string(),
            group_key,
            dispatched_at: Utc::now(),
            deadline,
        };

        debug!(
            "跟踪请求 {} (分组: {}, 截止: {:?})",
            correlation_id, request.group_key, deadline
        );

        let entry = TrackedEntry {
            request,
            seq,
            timer: task.abort_handle(),
        };

        if let Some(previous) = entries.insert(correlation_id.clone(), entry) {
            warn!("关联ID {} 已在跟踪中，替换旧请求", correlation_id);
            previous.timer.abort();
        }

        TimerHandle {
            correlation_id,
            deadline_at,
            abort: task.abort_handle(),
        }
    }

    async fn expire_at(
        entries: Arc<Mutex<EntryMap>>,
        correlation_id: CorrelationId,
        seq: u64,
        deadline_at: Instant,
        timeout_handler: Arc<dyn TimeoutHandler>,
    ) {
        tokio::time::sleep_until(deadline_at).await;

        let expired = {
            let mut entries = entries.lock().await;
            match entries.get(&correlation_id) {
                Some(entry) if entry.seq == seq => entries.remove(&correlation_id),
                _ => None,
            }
        };

        if let Some(entry) = expired {
            let request = entry.request;
            warn!(
                "请求 {} 超时未确认 (接入点: {}, 分组: {})",
                request.correlation_id, request.destination, request.group_key
            );
            timeout_handler
                .on_request_timeout(
                    &request.group_key,
                    &request.destination,
                    &request.correlation_id,
                )
                .await;
        }
    }

    pub async fn lookup(&self, correlation_id: &CorrelationId) -> Option<TrackedRequest> {
        let entries = self.entries.lock().await;
        entries.get(correlation_id).map(|entry| entry.request.clone())
    }

    /// 取消单个请求，返回该请求是否存在
    pub async fn cancel_one(&self, correlation_id: &CorrelationId) -> bool {
        let removed = self.entries.lock().await.remove(correlation_id);
        match removed {
            Some(entry) => {
                entry.timer.abort();
                debug!("取消请求 {} 的计时器", correlation_id);
                true
            }
            None => false,
        }
    }

    /// 取消某个接入点的全部在途请求
    pub async fn cancel_all_for(&self, destination: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let matching: Vec<CorrelationId> = entries
            .keys()
            .filter(|id| id.belongs_to(destination))
            .cloned()
            .collect();

        for correlation_id in &matching {
            if let Some(entry) = entries.remove(correlation_id) {
                entry.timer.abort();
                debug!("取消请求 {} 的计时器", correlation_id);
            }
        }

        if !matching.is_empty() {
            info!("已取消接入点 {} 的 {} 个在途请求", destination, matching.len());
        }
        matching.len()
    }

    pub async fn cancel_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        for (correlation_id, entry) in entries.drain() {
            debug!("取消请求 {} 的计时器", correlation_id);
            entry.timer.abort();
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn in_flight_for(&self, destination: &str) -> Vec<TrackedRequest> {
        let entries = self.entries.lock().await;
        let mut requests: Vec<TrackedRequest> = entries
            .values()
            .filter(|entry| entry.request.correlation_id.belongs_to(destination))
            .map(|entry| entry.request.clone())
            .collect();
        requests.sort_by(|a, b| a.dispatched_at.cmp(&b.dispatched_at));
        requests
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}
