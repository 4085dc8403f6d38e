//! 可观测性模块集成测试
//!
//! 测试 metrics、middleware 和配置的核心行为。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use cinetrack_shared::observability::metrics::{
        record_achievement_evaluation, record_dead_letter, record_event_handled,
        record_event_published, record_http_request, record_notification,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/events", 202, 0.004);
        record_http_request("POST", "/events", 503, 0.001);
        record_http_request("GET", "/health", 200, 0.0005);
    }

    #[test]
    fn test_record_event_lifecycle() {
        record_event_published("MOVIE_RELEASED");
        record_event_handled("MOVIE_RELEASED", "catalog-notifier", "success", 0.02);
        record_event_handled("REVIEW_CREATED", "review-notifier", "retry", 0.2);
        record_dead_letter("REVIEW_CREATED", "review-notifier");
    }

    #[test]
    fn test_record_achievement_and_notification() {
        record_achievement_evaluation("REVIEW_SUBMITTED", 1, 0.01);
        record_achievement_evaluation("MILESTONE_CHECK", 0, 0.03);
        record_notification("RELEASE", "sent");
        record_notification("ACHIEVEMENT", "failed");
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        // 空标签和极端耗时都不应 panic
        record_http_request("", "", 0, 0.0);
        record_event_handled("", "", "", f64::MAX);
        record_achievement_evaluation("", usize::MAX, 0.0);
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{Router, body::Body, http::Request, middleware, routing::get};
    use cinetrack_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|axum::Extension(id): axum::Extension<RequestId>| async move {
                    id.as_str().to_string()
                }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-42");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"req-42");
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[test]
    fn test_request_id_clone() {
        let id1 = RequestId("original".to_string());
        let id2 = id1.clone();
        assert_eq!(id1.as_str(), id2.as_str());
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use cinetrack_shared::observability::ObservabilityConfig;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port, 9090);
        assert!(config.metrics_enabled);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig {
            log_format: "JSON".to_string(),
            metrics_enabled: false,
            ..Default::default()
        }
        .with_service_name("notification-worker");

        assert_eq!(config.service_name, "notification-worker");
        assert!(config.json_logs());
        assert!(!config.metrics_enabled);
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use cinetrack_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
