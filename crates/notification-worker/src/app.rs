//! 组件装配
//!
//! 依赖方向：片库仓储 -> 进度 / 受众适配器 -> 成就引擎、编排器 -> 事件总线 -> 片库服务。
//! 片库服务最后创建，以事件总线作为发布者，避免循环依赖。

use std::sync::Arc;

use achievement_service::repository::{AchievementRepositoryTrait, UserAchievementRepositoryTrait};
use achievement_service::{AchievementChecker, AchievementEngine, AchievementQueryService};
use cinetrack_shared::bus::EventBus;
use cinetrack_shared::config::EventBusConfig;
use cinetrack_shared::retry::RetryPolicy;
use library_service::LibraryService;
use library_service::repository::{
    FavoriteRepositoryTrait, ReviewRepositoryTrait, WatchHistoryRepositoryTrait,
    WatchlistRepositoryTrait,
};

use crate::adapters::{LibraryAudience, LibraryProgress};
use crate::composer::NotificationComposer;
use crate::dispatch::NotificationDispatch;
use crate::handlers;

/// 片库仓储集合
pub struct LibraryStores<W, F, R, H> {
    pub watchlist: Arc<W>,
    pub favorites: Arc<F>,
    pub reviews: Arc<R>,
    pub history: Arc<H>,
}

/// 成就仓储集合
pub struct AchievementStores<AR, UAR> {
    pub definitions: Arc<AR>,
    pub records: Arc<UAR>,
}

type Progress<W, F, R, H> = LibraryProgress<W, F, R, H>;

/// 装配完成的处理管线
pub struct Pipeline<W, F, R, H, AR, UAR>
where
    W: WatchlistRepositoryTrait + 'static,
    F: FavoriteRepositoryTrait + 'static,
    R: ReviewRepositoryTrait + 'static,
    H: WatchHistoryRepositoryTrait + 'static,
    AR: AchievementRepositoryTrait + 'static,
    UAR: UserAchievementRepositoryTrait + 'static,
{
    pub bus: Arc<EventBus>,
    pub library: Arc<LibraryService<W, F, R, H>>,
    pub achievements: Arc<AchievementQueryService<AR, UAR, Progress<W, F, R, H>>>,
    pub composer: Arc<NotificationComposer>,
}

/// 创建事件总线和全部处理器，必须在 tokio 运行时内调用
pub fn build_pipeline<W, F, R, H, AR, UAR>(
    bus_config: EventBusConfig,
    retry: RetryPolicy,
    library: LibraryStores<W, F, R, H>,
    achievements: AchievementStores<AR, UAR>,
    dispatch: Arc<dyn NotificationDispatch>,
) -> Pipeline<W, F, R, H, AR, UAR>
where
    W: WatchlistRepositoryTrait + 'static,
    F: FavoriteRepositoryTrait + 'static,
    R: ReviewRepositoryTrait + 'static,
    H: WatchHistoryRepositoryTrait + 'static,
    AR: AchievementRepositoryTrait + 'static,
    UAR: UserAchievementRepositoryTrait + 'static,
{
    let progress = Arc::new(LibraryProgress::new(
        library.watchlist.clone(),
        library.favorites.clone(),
        library.reviews.clone(),
        library.history.clone(),
    ));
    let audience = Arc::new(LibraryAudience::new(
        library.watchlist.clone(),
        library.favorites.clone(),
    ));

    let engine: Arc<dyn AchievementChecker> = Arc::new(AchievementEngine::new(
        achievements.definitions.clone(),
        achievements.records.clone(),
        progress.clone(),
    ));
    let queries = Arc::new(AchievementQueryService::new(
        achievements.definitions,
        achievements.records,
        progress,
    ));

    let composer = Arc::new(NotificationComposer::new(audience, engine, dispatch));

    let builder = EventBus::builder(bus_config).retry_policy(retry);
    let bus = Arc::new(handlers::register(builder, composer.clone()).build());

    let library = Arc::new(LibraryService::new(
        library.watchlist,
        library.favorites,
        library.reviews,
        library.history,
        bus.clone(),
    ));

    Pipeline {
        bus,
        library,
        achievements: queries,
        composer,
    }
}
