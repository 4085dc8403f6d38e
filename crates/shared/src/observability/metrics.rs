//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("events_published_total", "Total number of published events");
    metrics::describe_counter!("events_handled_total", "Total number of handler executions");
    metrics::describe_histogram!(
        "event_handle_duration_seconds",
        "Handler execution duration in seconds, retries included"
    );
    metrics::describe_counter!("events_dead_lettered_total", "Total number of dead letters");

    metrics::describe_counter!(
        "achievement_evaluations_total",
        "Total number of achievement evaluations"
    );
    metrics::describe_histogram!(
        "achievement_evaluation_duration_seconds",
        "Achievement evaluation duration in seconds"
    );
    metrics::describe_counter!("achievements_unlocked_total", "Total number of unlocks");

    metrics::describe_counter!("notifications_total", "Total number of notification sends");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "指标服务已监听");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "指标服务异常退出");
        }
    });

    Ok(server_handle)
}

pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

#[inline]
pub fn record_event_published(kind: &str) {
    metrics::counter!("events_published_total", "kind" => kind.to_string()).increment(1);
}

/// 记录处理器执行结果，status 为 success / failed
#[inline]
pub fn record_event_handled(kind: &str, handler: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "events_handled_total",
        "kind" => kind.to_string(),
        "handler" => handler.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "event_handle_duration_seconds",
        "kind" => kind.to_string(),
        "handler" => handler.to_string()
    )
    .record(duration_secs);
}

#[inline]
pub fn record_dead_letter(kind: &str, handler: &str) {
    metrics::counter!(
        "events_dead_lettered_total",
        "kind" => kind.to_string(),
        "handler" => handler.to_string()
    )
    .increment(1);
}

/// 记录一次成就评估
#[inline]
pub fn record_achievement_evaluation(trigger: &str, unlocked: usize, duration_secs: f64) {
    metrics::counter!(
        "achievement_evaluations_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "achievement_evaluation_duration_seconds",
        "trigger" => trigger.to_string()
    )
    .record(duration_secs);

    if unlocked > 0 {
        metrics::counter!(
            "achievements_unlocked_total",
            "trigger" => trigger.to_string()
        )
        .increment(unlocked as u64);
    }
}

#[inline]
pub fn record_notification(category: &str, status: &str) {
    metrics::counter!(
        "notifications_total",
        "category" => category.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
