//! 通知投递
//!
//! 编排器只把 `NotificationRequest` 交给 `NotificationDispatch`，不等待送达。
//! `QueuedDispatch` 在有界队列后面挂一个 `NotificationSink`，由后台任务串行写入；
//! 队列满时最多 `overflow_limit` 个请求在后台等待入队，再多则拒绝并计数。
//! 真正的推送渠道（邮件、Web Push）不在本服务内。

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use cinetrack_shared::config::DispatchConfig;
use cinetrack_shared::events::NotificationRequest;
use cinetrack_shared::observability::metrics;
use cinetrack_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::{NotificationError, Result};

/// 通知投递入口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// 交付一条通知请求，返回时不保证已送达
    async fn dispatch(&self, request: NotificationRequest) -> Result<()>;
}

/// 通知落地目标
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, request: &NotificationRequest) -> Result<()>;
}

// ---------------------------------------------------------------------------
// 落地目标
// ---------------------------------------------------------------------------

/// 只写日志的落地目标，开发环境使用
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        info!(
            notification_id = %request.notification_id,
            user_id = %request.user_id,
            category = request.category.as_str(),
            title = %request.title,
            message = %request.message,
            "通知已生成"
        );
        Ok(())
    }
}

/// 写入 notifications 表
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        // notification_id 唯一，重试时重复写入直接忽略
        sqlx::query(
            r#"
            INSERT INTO notifications
                (notification_id, user_id, category, title, message, item_id, item_type, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (notification_id) DO NOTHING
            "#,
        )
        .bind(&request.notification_id)
        .bind(&request.user_id)
        .bind(request.category)
        .bind(&request.title)
        .bind(&request.message)
        .bind(&request.item_id)
        .bind(request.item_type)
        .bind(sqlx::types::Json(&request.metadata))
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 队列投递
// ---------------------------------------------------------------------------

/// 有界队列 + 后台写入任务
///
/// 队列满时把请求交给一个独立任务等待入队，调用方永不阻塞。
/// 等待入队的任务数受 `overflow_limit` 限制，超出时返回 `DispatchOverloaded`。
pub struct QueuedDispatch {
    sender: Mutex<Option<mpsc::Sender<NotificationRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    overflow: Arc<Semaphore>,
    overflow_limit: usize,
}

impl QueuedDispatch {
    /// 启动后台写入任务，必须在 tokio 运行时内调用
    pub fn start(sink: Arc<dyn NotificationSink>, config: &DispatchConfig, retry: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_sink(sink, rx, retry));

        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            overflow: Arc::new(Semaphore::new(config.overflow_limit)),
            overflow_limit: config.overflow_limit,
        }
    }

    /// 停止接收新请求，等待队列中已有请求写完
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            error!(error = %e, "通知写入任务异常退出");
        }
        info!("通知投递队列已关闭");
    }
}

#[async_trait]
impl NotificationDispatch for QueuedDispatch {
    async fn dispatch(&self, request: NotificationRequest) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(NotificationError::DispatchClosed)?;

        match sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(request)) => {
                let Ok(permit) = self.overflow.clone().try_acquire_owned() else {
                    warn!(
                        notification_id = %request.notification_id,
                        limit = self.overflow_limit,
                        "投递队列过载，通知被拒绝"
                    );
                    metrics::record_notification(request.category.as_str(), "rejected");
                    return Err(NotificationError::DispatchOverloaded {
                        limit: self.overflow_limit,
                    });
                };

                debug!(notification_id = %request.notification_id, "投递队列已满，转后台等待");
                tokio::spawn(async move {
                    if let Err(e) = sender.send(request).await {
                        warn!(notification_id = %e.0.notification_id, "投递队列已关闭，通知丢失");
                    }
                    drop(permit);
                });
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NotificationError::DispatchClosed),
        }
    }
}

async fn run_sink(
    sink: Arc<dyn NotificationSink>,
    mut rx: mpsc::Receiver<NotificationRequest>,
    retry: RetryPolicy,
) {
    let name = sink.name();
    while let Some(request) = rx.recv().await {
        let target = sink.as_ref();
        let pending = &request;
        let outcome = retry_with_policy(&retry, name, move || async move {
            target
                .deliver(pending)
                .await
                .map_err(|e| e.into_handler_error(name))
        })
        .await;

        match outcome.result {
            Ok(()) => metrics::record_notification(request.category.as_str(), "sent"),
            Err(e) => {
                error!(
                    notification_id = %request.notification_id,
                    user_id = %request.user_id,
                    sink = name,
                    attempts = outcome.attempts,
                    error = %e,
                    "通知写入失败"
                );
                metrics::record_notification(request.category.as_str(), "failed");
            }
        }
    }
    debug!(sink = name, "通知写入任务已退出");
}

// ---------------------------------------------------------------------------
// 内存投递
// ---------------------------------------------------------------------------

/// 记录所有请求的内存投递，用于测试和演练
#[derive(Default)]
pub struct MemoryDispatch {
    sent: Mutex<Vec<NotificationRequest>>,
}

impl MemoryDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, user_id: &str) -> Vec<NotificationRequest> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationDispatch for MemoryDispatch {
    async fn dispatch(&self, request: NotificationRequest) -> Result<()> {
        metrics::record_notification(request.category.as_str(), "recorded");
        self.sent.lock().push(request);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryDispatch {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinetrack_shared::events::NotificationCategory;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn request(user_id: &str) -> NotificationRequest {
        NotificationRequest::new(user_id, NotificationCategory::Release, "上映", "《沙丘》已上映")
    }

    fn limits(queue_capacity: usize, overflow_limit: usize) -> DispatchConfig {
        DispatchConfig {
            queue_capacity,
            overflow_limit,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    /// 前 `fail_times` 次写入失败
    struct FlakySink {
        calls: AtomicU32,
        fail_times: u32,
        inner: MemoryDispatch,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_times {
                return Err(NotificationError::DispatchFailed {
                    notification_id: request.notification_id.clone(),
                    reason: "模拟故障".to_string(),
                });
            }
            self.inner.deliver(request).await
        }
    }

    #[tokio::test]
    async fn test_queued_dispatch_drains_on_shutdown() {
        let sink = Arc::new(MemoryDispatch::new());
        let dispatch = QueuedDispatch::start(sink.clone(), &limits(2, 16), fast_retry());

        // 超过队列容量的请求由后台任务等待入队
        for i in 0..10 {
            dispatch.dispatch(request(&format!("u-{i}"))).await.unwrap();
        }
        dispatch.shutdown().await;

        assert_eq!(sink.len(), 10);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_fails() {
        let dispatch = QueuedDispatch::start(Arc::new(LogSink), &limits(4, 4), fast_retry());
        dispatch.shutdown().await;

        let err = dispatch.dispatch(request("u-1")).await.unwrap_err();
        assert!(matches!(err, NotificationError::DispatchClosed));
    }

    #[tokio::test]
    async fn test_sink_failures_are_retried() {
        let sink = Arc::new(FlakySink {
            calls: AtomicU32::new(0),
            fail_times: 2,
            inner: MemoryDispatch::new(),
        });
        let dispatch = QueuedDispatch::start(sink.clone(), &limits(4, 4), fast_retry());

        dispatch.dispatch(request("u-1")).await.unwrap();
        dispatch.shutdown().await;

        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.inner.sent_to("u-1").len(), 1);
    }

    /// 放行前一直阻塞的落地目标
    struct GatedSink {
        gate: Arc<Semaphore>,
        inner: MemoryDispatch,
    }

    #[async_trait]
    impl NotificationSink for GatedSink {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn deliver(&self, request: &NotificationRequest) -> Result<()> {
            let _permit = self.gate.acquire().await;
            self.inner.deliver(request).await
        }
    }

    #[tokio::test]
    async fn test_overflow_beyond_limit_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Arc::new(GatedSink {
            gate: gate.clone(),
            inner: MemoryDispatch::new(),
        });
        let dispatch = QueuedDispatch::start(sink.clone(), &limits(1, 2), fast_retry());

        // 写入任务取走第一条后阻塞；之后一条占满队列，两条进入溢出等待
        let mut accepted = 0;
        let mut rejected = 0;
        for i in 0..8 {
            match dispatch.dispatch(request(&format!("u-{i}"))).await {
                Ok(()) => accepted += 1,
                Err(NotificationError::DispatchOverloaded { limit }) => {
                    assert_eq!(limit, 2);
                    rejected += 1;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
            tokio::task::yield_now().await;
        }
        assert!(rejected > 0);
        assert!(accepted <= 4);

        gate.add_permits(100);
        dispatch.shutdown().await;
        assert_eq!(sink.inner.len(), accepted);
    }

    #[tokio::test]
    async fn test_memory_dispatch_filters_by_user() {
        let dispatch = MemoryDispatch::new();
        dispatch.dispatch(request("u-1")).await.unwrap();
        dispatch.dispatch(request("u-2")).await.unwrap();

        assert_eq!(dispatch.len(), 2);
        assert_eq!(dispatch.sent_to("u-2").len(), 1);

        dispatch.clear();
        assert!(dispatch.is_empty());
    }
}
