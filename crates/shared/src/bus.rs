//! 进程内事件总线
//!
//! 每个 `EventKind` 一条有界 mpsc 通道，由固定数量的 worker 任务共同消费，
//! worker 将信封并行分发给该类别的所有订阅处理器。
//!
//! ## 投递语义
//!
//! - **至少一次**：处理器返回可重试错误时按 `RetryPolicy` 退避重试，
//!   重试耗尽或不可重试的失败进入死信存储，可通过 `redeliver_dead_letters` 重新投递
//! - **幂等**：处理成功后以 `(event_id, handler)` 记录幂等标记，
//!   同一信封再次投递时已成功的处理器直接跳过
//! - **顺序**：同一类别在单 worker 时按发布顺序出队；多 worker 时不保证顺序；
//!   不同类别之间没有任何顺序保证

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EventBusConfig;
use crate::error::{CineError, Result};
use crate::events::{DomainEvent, EventEnvelope, EventKind};
use crate::observability::metrics;
use crate::retry::{RetryPolicy, retry_with_policy};

/// 超过此数量后在写入幂等标记时顺带清理过期记录
const IDEMPOTENCY_PURGE_THRESHOLD: usize = 10_000;

// ---------------------------------------------------------------------------
// 处理器与发布者抽象
// ---------------------------------------------------------------------------

/// 事件处理器
///
/// `name` 参与幂等键计算，同一总线上的处理器名称必须唯一。
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// 事件发布接口
///
/// 业务服务只依赖此 trait，便于在测试中替换为记录型实现。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 发布事件，返回生成的 event_id
    async fn publish(&self, event: DomainEvent) -> Result<String>;
}

// ---------------------------------------------------------------------------
// 死信与幂等
// ---------------------------------------------------------------------------

/// 死信记录
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: EventEnvelope,
    pub handler: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// 处理器级幂等标记
struct IdempotencyGuard {
    processed: DashMap<String, Instant>,
    ttl: Duration,
}

impl IdempotencyGuard {
    fn new(ttl: Duration) -> Self {
        Self {
            processed: DashMap::new(),
            ttl,
        }
    }

    fn key(event_id: &str, handler: &str) -> String {
        format!("{event_id}:{handler}")
    }

    fn is_processed(&self, event_id: &str, handler: &str) -> bool {
        self.processed
            .get(&Self::key(event_id, handler))
            .is_some_and(|marked_at| marked_at.elapsed() < self.ttl)
    }

    fn mark_processed(&self, event_id: &str, handler: &str) {
        if self.processed.len() >= IDEMPOTENCY_PURGE_THRESHOLD {
            let ttl = self.ttl;
            self.processed.retain(|_, marked_at| marked_at.elapsed() < ttl);
        }
        self.processed
            .insert(Self::key(event_id, handler), Instant::now());
    }
}

/// worker 之间共享的运行状态
struct BusState {
    in_flight: AtomicUsize,
    idle: Notify,
    dead_letters: Mutex<Vec<DeadLetter>>,
    idempotency: IdempotencyGuard,
    retry_policy: RetryPolicy,
}

impl BusState {
    fn finish_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

// ---------------------------------------------------------------------------
// 构建器
// ---------------------------------------------------------------------------

/// 事件总线构建器
///
/// 订阅关系在启动前确定，`build` 之后不可再追加处理器。
pub struct EventBusBuilder {
    config: EventBusConfig,
    retry_policy: RetryPolicy,
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBusBuilder {
    pub fn new(config: EventBusConfig) -> Self {
        let retry_policy = RetryPolicy::from_config(&config);
        Self {
            config,
            retry_policy,
            handlers: HashMap::new(),
        }
    }

    /// 覆盖重试策略（测试中常用极短退避）
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn subscribe(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    /// 同一处理器订阅多个类别
    pub fn subscribe_all(mut self, kinds: &[EventKind], handler: Arc<dyn EventHandler>) -> Self {
        for kind in kinds {
            self = self.subscribe(*kind, handler.clone());
        }
        self
    }

    /// 创建通道并启动 worker，必须在 tokio 运行时内调用
    pub fn build(self) -> EventBus {
        let workers_per_kind = self.config.workers_per_kind.max(1);
        let state = Arc::new(BusState {
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            dead_letters: Mutex::new(Vec::new()),
            idempotency: IdempotencyGuard::new(Duration::from_secs(
                self.config.idempotency_ttl_seconds,
            )),
            retry_policy: self.retry_policy,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut senders = HashMap::new();
        let mut workers = Vec::new();

        for (kind, handlers) in self.handlers {
            let (tx, rx) = mpsc::channel::<EventEnvelope>(self.config.queue_capacity.max(1));
            let rx = Arc::new(tokio::sync::Mutex::new(rx));
            let handlers: Arc<[Arc<dyn EventHandler>]> = handlers.into();

            for worker_id in 0..workers_per_kind {
                workers.push(tokio::spawn(worker_loop(
                    kind,
                    worker_id,
                    rx.clone(),
                    handlers.clone(),
                    state.clone(),
                    shutdown_rx.clone(),
                )));
            }

            info!(
                kind = %kind,
                handlers = handlers.len(),
                workers = workers_per_kind,
                "事件通道已启动"
            );
            senders.insert(kind, tx);
        }

        EventBus {
            senders,
            state,
            shutdown_tx,
            workers: Mutex::new(workers),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// 事件总线
pub struct EventBus {
    senders: HashMap<EventKind, mpsc::Sender<EventEnvelope>>,
    state: Arc<BusState>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    pub fn builder(config: EventBusConfig) -> EventBusBuilder {
        EventBusBuilder::new(config)
    }

    /// 发布信封，队列满时等待容量
    ///
    /// 没有订阅者的类别直接丢弃并返回成功
    pub async fn publish_envelope(&self, envelope: EventEnvelope) -> Result<String> {
        let kind = envelope.kind();
        let Some(sender) = self.senders.get(&kind) else {
            debug!(kind = %kind, event_id = %envelope.event_id, "无订阅者，事件丢弃");
            return Ok(envelope.event_id);
        };

        let event_id = envelope.event_id.clone();
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(envelope).await.is_err() {
            self.state.finish_one();
            return Err(CineError::BusClosed);
        }

        metrics::record_event_published(kind.as_str());
        debug!(kind = %kind, event_id = %event_id, "事件已发布");
        Ok(event_id)
    }

    /// 非阻塞发布，队列满时返回 `QueueFull`
    pub fn try_publish(&self, event: DomainEvent) -> Result<String> {
        let envelope = EventEnvelope::new(event);
        let kind = envelope.kind();
        let Some(sender) = self.senders.get(&kind) else {
            return Ok(envelope.event_id);
        };

        let event_id = envelope.event_id.clone();
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(envelope) {
            Ok(()) => {
                metrics::record_event_published(kind.as_str());
                Ok(event_id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.state.finish_one();
                Err(CineError::QueueFull {
                    kind: kind.to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.state.finish_one();
                Err(CineError::BusClosed)
            }
        }
    }

    /// 等待所有已发布信封处理完毕（含重试和死信记录）
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 当前死信快照
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.dead_letters.lock().clone()
    }

    /// 将死信重新投递
    ///
    /// 信封保持原 event_id，已成功的处理器会被幂等标记跳过，只重跑失败的处理器。
    /// 返回重新投递的数量。
    pub async fn redeliver_dead_letters(&self) -> Result<usize> {
        let letters = std::mem::take(&mut *self.state.dead_letters.lock());

        let mut seen = std::collections::HashSet::new();
        let mut count = 0;
        for letter in letters {
            if !seen.insert(letter.envelope.event_id.clone()) {
                continue;
            }
            self.publish_envelope(letter.envelope).await?;
            count += 1;
        }

        info!(count, "死信已重新投递");
        Ok(count)
    }

    /// 通知 worker 退出并等待其结束
    ///
    /// worker 会先消费完通道中已有的信封再退出
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "事件 worker 异常退出");
            }
        }
        info!("事件总线已关闭");
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: DomainEvent) -> Result<String> {
        self.publish_envelope(EventEnvelope::new(event)).await
    }
}

// ---------------------------------------------------------------------------
// worker
// ---------------------------------------------------------------------------

async fn worker_loop(
    kind: EventKind,
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<EventEnvelope>>>,
    handlers: Arc<[Arc<dyn EventHandler>]>,
    state: Arc<BusState>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(kind = %kind, worker_id, "事件 worker 已启动");

    loop {
        let next = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                // 偏向消息分支，关闭前先把队列中已有的信封处理完
                biased;

                envelope = rx.recv() => envelope,
                _ = shutdown.changed() => None,
            }
        };

        let Some(envelope) = next else {
            break;
        };

        deliver(kind, &envelope, &handlers, &state).await;
        state.finish_one();
    }

    debug!(kind = %kind, worker_id, "事件 worker 已退出");
}

/// 将信封并行分发给所有处理器，单个处理器失败不影响其他处理器
async fn deliver(
    kind: EventKind,
    envelope: &EventEnvelope,
    handlers: &[Arc<dyn EventHandler>],
    state: &BusState,
) {
    let tasks = handlers.iter().map(|handler| {
        let handler: &dyn EventHandler = handler.as_ref();
        async move {
            let name = handler.name();
            if state.idempotency.is_processed(&envelope.event_id, name) {
                debug!(event_id = %envelope.event_id, handler = name, "事件已处理，跳过");
                return;
            }

            let start = Instant::now();
            let outcome =
                retry_with_policy(&state.retry_policy, name, move || handler.handle(envelope))
                    .await;
            let elapsed = start.elapsed().as_secs_f64();

            match outcome.result {
                Ok(()) => {
                    state.idempotency.mark_processed(&envelope.event_id, name);
                    metrics::record_event_handled(kind.as_str(), name, "success", elapsed);
                }
                Err(e) => {
                    warn!(
                        kind = %kind,
                        event_id = %envelope.event_id,
                        handler = name,
                        attempts = outcome.attempts,
                        error = %e,
                        "事件处理失败，已写入死信"
                    );
                    metrics::record_event_handled(kind.as_str(), name, "failed", elapsed);
                    metrics::record_dead_letter(kind.as_str(), name);
                    state.dead_letters.lock().push(DeadLetter {
                        envelope: envelope.clone(),
                        handler: name.to_string(),
                        error: e.to_string(),
                        attempts: outcome.attempts,
                        failed_at: Utc::now(),
                    });
                }
            }
        }
    });

    futures::future::join_all(tasks).await;
}
