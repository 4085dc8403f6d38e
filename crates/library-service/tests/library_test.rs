//! 片库服务集成测试（内存仓储）

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cinetrack_shared::bus::EventPublisher;
use cinetrack_shared::error::Result as CineResult;
use cinetrack_shared::events::{DomainEvent, ItemType, triggers};
use library_service::repository::{
    MemoryFavoriteRepository, MemoryReviewRepository, MemoryWatchHistoryRepository,
    MemoryWatchlistRepository,
};
use library_service::{
    AddLibraryItemRequest, LibraryError, LibraryService, RecordWatchRequest, SubmitReviewRequest,
};

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> CineResult<String> {
        self.events.lock().push(event);
        Ok(format!("evt-{}", self.events.lock().len()))
    }
}

type MemoryLibrary = LibraryService<
    MemoryWatchlistRepository,
    MemoryFavoriteRepository,
    MemoryReviewRepository,
    MemoryWatchHistoryRepository,
>;

fn setup() -> (MemoryLibrary, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let service = LibraryService::new(
        Arc::new(MemoryWatchlistRepository::new()),
        Arc::new(MemoryFavoriteRepository::new()),
        Arc::new(MemoryReviewRepository::new()),
        Arc::new(MemoryWatchHistoryRepository::new()),
        publisher.clone(),
    );
    (service, publisher)
}

fn item(user_id: &str, item_id: &str) -> AddLibraryItemRequest {
    AddLibraryItemRequest {
        user_id: user_id.to_string(),
        item_id: item_id.to_string(),
        item_type: ItemType::Movie,
        item_title: "奥本海默".to_string(),
    }
}

fn review(user_id: &str, item_id: &str, rating: i16) -> SubmitReviewRequest {
    SubmitReviewRequest {
        user_id: user_id.to_string(),
        item_id: item_id.to_string(),
        item_type: ItemType::Movie,
        item_title: "奥本海默".to_string(),
        rating,
        content: "三小时不觉得长".to_string(),
    }
}

#[tokio::test]
async fn test_watchlist_add_publishes_activity() {
    let (service, publisher) = setup();

    service.add_to_watchlist(item("u-1", "m-1")).await.unwrap();

    let events = publisher.events.lock().clone();
    assert_eq!(
        events,
        vec![DomainEvent::user_activity("u-1", triggers::WATCHLIST_ADDED)]
    );
    assert_eq!(service.list_watchlist("u-1").await.unwrap().len(), 1);
    assert_eq!(service.watchlist_holders("m-1").await.unwrap(), vec!["u-1"]);
}

#[tokio::test]
async fn test_duplicate_watchlist_is_conflict() {
    let (service, publisher) = setup();

    service.add_to_watchlist(item("u-1", "m-1")).await.unwrap();
    let err = service.add_to_watchlist(item("u-1", "m-1")).await.unwrap_err();

    assert!(matches!(err, LibraryError::AlreadyInWatchlist { .. }));
    assert_eq!(err.status_code().as_u16(), 409);
    assert_eq!(publisher.events.lock().len(), 1);
    assert_eq!(service.count_watchlist("u-1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_remove_then_readd_watchlist() {
    let (service, _) = setup();

    service.add_to_watchlist(item("u-1", "m-1")).await.unwrap();
    service.remove_from_watchlist("u-1", "m-1").await.unwrap();
    let err = service
        .remove_from_watchlist("u-1", "m-1")
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::NotInWatchlist { .. }));

    service.add_to_watchlist(item("u-1", "m-1")).await.unwrap();
    assert_eq!(service.count_watchlist("u-1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_favorites_are_independent_of_watchlist() {
    let (service, publisher) = setup();

    service.add_to_watchlist(item("u-1", "m-1")).await.unwrap();
    service.add_favorite(item("u-1", "m-1")).await.unwrap();
    let err = service.add_favorite(item("u-1", "m-1")).await.unwrap_err();
    assert!(matches!(err, LibraryError::AlreadyFavorited { .. }));

    assert_eq!(service.list_favorites("u-1").await.unwrap().len(), 1);
    assert_eq!(service.favorite_holders("m-1").await.unwrap(), vec!["u-1"]);
    assert!(
        publisher
            .events
            .lock()
            .contains(&DomainEvent::user_activity("u-1", triggers::FAVORITE_ADDED))
    );
}

#[tokio::test]
async fn test_submit_review_publishes_review_created_and_activity() {
    let (service, publisher) = setup();

    let saved = service.submit_review(review("u-1", "m-1", 9)).await.unwrap();
    assert_eq!(saved.rating, 9);
    assert!(!saved.id.is_empty());

    let events = publisher.events.lock().clone();
    assert_eq!(events.len(), 2);
    match &events[0] {
        DomainEvent::ReviewCreated {
            review,
            item_title,
            item_type,
        } => {
            assert_eq!(review.id, saved.id);
            assert_eq!(review.user_id, "u-1");
            assert_eq!(review.rating, Some(9));
            assert_eq!(item_title, "奥本海默");
            assert_eq!(*item_type, ItemType::Movie);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(
        events[1],
        DomainEvent::user_activity("u-1", triggers::REVIEW_SUBMITTED)
    );
}

#[tokio::test]
async fn test_one_review_per_user_and_item() {
    let (service, publisher) = setup();

    service.submit_review(review("u-1", "m-1", 7)).await.unwrap();
    let err = service
        .submit_review(review("u-1", "m-1", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::AlreadyReviewed { .. }));

    service.submit_review(review("u-2", "m-1", 6)).await.unwrap();

    assert_eq!(service.list_reviews_for_item("m-1").await.unwrap().len(), 2);
    assert_eq!(service.count_reviews("u-1").await.unwrap(), 1);
    assert_eq!(publisher.events.lock().len(), 4);
}

#[tokio::test]
async fn test_rating_out_of_range_rejected() {
    let (service, publisher) = setup();

    let err = service
        .submit_review(review("u-1", "m-1", 11))
        .await
        .unwrap_err();

    assert!(matches!(err, LibraryError::Validation(_)));
    assert!(publisher.events.lock().is_empty());
    assert!(service.list_reviews_for_item("m-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rewatch_counts_once() {
    let (service, publisher) = setup();

    for item_id in ["m-1", "m-1", "s-1"] {
        service
            .record_watch(RecordWatchRequest {
                user_id: "u-1".to_string(),
                item_id: item_id.to_string(),
                item_type: ItemType::Movie,
            })
            .await
            .unwrap();
    }

    assert_eq!(service.list_watch_history("u-1").await.unwrap().len(), 3);
    assert_eq!(service.count_watched_items("u-1").await.unwrap(), 2);
    assert_eq!(publisher.events.lock().len(), 3);
}
