//! 通知工作者服务入口
//!
//! 按 `storage.backend` 选择内存或 PostgreSQL 存储，装配事件总线后启动事件接入接口。

use std::sync::Arc;

use achievement_service::catalog;
use achievement_service::repository::{
    AchievementRepository, MemoryAchievementRepository, MemoryUserAchievementRepository,
    UserAchievementRepository,
};
use cinetrack_shared::config::{AppConfig, StorageBackend};
use cinetrack_shared::database::Database;
use cinetrack_shared::observability;
use cinetrack_shared::retry::RetryPolicy;
use library_service::repository::{
    FavoriteRepository, MemoryFavoriteRepository, MemoryReviewRepository,
    MemoryWatchHistoryRepository, MemoryWatchlistRepository, ReviewRepository,
    WatchHistoryRepository, WatchlistRepository,
};
use notification_worker::ingest::{self, IngestState};
use notification_worker::{
    AchievementStores, LibraryStores, LogSink, NotificationSink, PgNotificationSink,
    QueuedDispatch, build_pipeline,
};
use tokio::net::TcpListener;
use tracing::info;

const SERVICE_NAME: &str = "notification-worker";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        backend = ?config.storage.backend,
        addr = %config.server_addr(),
        "Starting notification-worker"
    );

    let retry = RetryPolicy::from_config(&config.event_bus);

    let (bus, dispatch, database) = match config.storage.backend {
        StorageBackend::Memory => {
            let definitions = MemoryAchievementRepository::new();
            definitions.insert_many(catalog::builtin_definitions());

            let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
            let dispatch = Arc::new(QueuedDispatch::start(
                sink,
                &config.dispatch,
                retry.clone(),
            ));

            let pipeline = build_pipeline(
                config.event_bus.clone(),
                retry,
                LibraryStores {
                    watchlist: Arc::new(MemoryWatchlistRepository::new()),
                    favorites: Arc::new(MemoryFavoriteRepository::new()),
                    reviews: Arc::new(MemoryReviewRepository::new()),
                    history: Arc::new(MemoryWatchHistoryRepository::new()),
                },
                AchievementStores {
                    definitions: Arc::new(definitions),
                    records: Arc::new(MemoryUserAchievementRepository::new()),
                },
                dispatch.clone(),
            );
            (pipeline.bus, dispatch, None)
        }
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            let pool = db.pool().clone();

            let sink: Arc<dyn NotificationSink> = Arc::new(PgNotificationSink::new(pool.clone()));
            let dispatch = Arc::new(QueuedDispatch::start(
                sink,
                &config.dispatch,
                retry.clone(),
            ));

            let pipeline = build_pipeline(
                config.event_bus.clone(),
                retry,
                LibraryStores {
                    watchlist: Arc::new(WatchlistRepository::new(pool.clone())),
                    favorites: Arc::new(FavoriteRepository::new(pool.clone())),
                    reviews: Arc::new(ReviewRepository::new(pool.clone())),
                    history: Arc::new(WatchHistoryRepository::new(pool.clone())),
                },
                AchievementStores {
                    definitions: Arc::new(AchievementRepository::new(pool.clone())),
                    records: Arc::new(UserAchievementRepository::new(pool)),
                },
                dispatch.clone(),
            );
            (pipeline.bus, dispatch, Some(db))
        }
    };

    let app = ingest::router(IngestState {
        bus: bus.clone(),
        service_name: config.service_name.clone(),
    });

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 先停总线再停投递，保证已入队事件产生的通知全部写出
    bus.shutdown().await;
    dispatch.shutdown().await;
    if let Some(db) = database {
        db.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// 监听 Ctrl+C 与 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
