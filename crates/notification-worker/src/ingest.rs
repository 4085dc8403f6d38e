//! 事件接入 HTTP 接口
//!
//! 目录服务等外部生产者通过 `POST /events` 投递 JSON 领域事件，
//! 接口只负责入队，处理结果不在响应中体现。

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use cinetrack_shared::bus::EventBus;
use cinetrack_shared::error::CineError;
use cinetrack_shared::events::DomainEvent;
use cinetrack_shared::observability::middleware as obs_middleware;

#[derive(Clone)]
pub struct IngestState {
    pub bus: Arc<EventBus>,
    pub service_name: String,
}

pub fn router(state: IngestState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/events", post(ingest_event))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

/// 接收一条领域事件
///
/// 队列满时返回 503 由调用方稍后重试，不在请求线程上等待
async fn ingest_event(State(state): State<IngestState>, Json(event): Json<DomainEvent>) -> Response {
    let kind = event.kind();
    match state.bus.try_publish(event) {
        Ok(event_id) => {
            info!(kind = %kind, event_id = %event_id, "外部事件已入队");
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "success": true,
                    "code": "ACCEPTED",
                    "message": "事件已接收",
                    "data": { "eventId": event_id }
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "外部事件入队失败");
            error_response(&e)
        }
    }
}

fn error_response(err: &CineError) -> Response {
    (
        err.status_code(),
        Json(json!({
            "success": false,
            "code": err.code(),
            "message": err.to_string(),
            "data": serde_json::Value::Null
        })),
    )
        .into_response()
}

async fn health_check(State(state): State<IngestState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name
    }))
}
