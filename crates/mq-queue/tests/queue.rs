//! Queue and progress-store integration tests.

use mq_models::{ImageResult, ItemResult, MediaItem, PostStatus, VideoItem};
use mq_queue::{JobQueue, ProcessPostJob, ProgressStore, QueueConfig, QueueJob};

fn test_job(post_id: &str) -> QueueJob {
    QueueJob::ProcessPost(ProcessPostJob {
        post_id: post_id.to_string(),
        media: vec![MediaItem::Video(VideoItem {
            media_id: "m1".into(),
            filename: "a.mp4".into(),
            original_name: "a.mp4".into(),
            height: 720,
        })],
        s3_key: format!("posts/{}/", post_id),
        user_id: "u1".into(),
        callback_url: None,
    })
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_consume_ack() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::new(QueueConfig::from_env()).expect("queue");
    queue.init().await.expect("init");

    let post_id = format!("it-{}", uuid::Uuid::new_v4());
    let job = test_job(&post_id);

    queue.enqueue(&job).await.expect("enqueue");

    let jobs = queue.consume("test-consumer", 1000, 1).await.expect("consume");
    assert_eq!(jobs.len(), 1);
    let (message_id, consumed) = &jobs[0];
    assert_eq!(consumed.post_id(), post_id);

    queue.ack(message_id).await.expect("ack");
    queue.clear_dedup(&job).await.expect("clear dedup");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_enqueue_rejected() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::new(QueueConfig::from_env()).expect("queue");
    queue.init().await.expect("init");

    let post_id = format!("it-{}", uuid::Uuid::new_v4());
    let job = test_job(&post_id);

    queue.enqueue(&job).await.expect("first enqueue");
    assert!(queue.enqueue(&job).await.is_err());

    queue.clear_dedup(&job).await.expect("clear dedup");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_store_round_trip() {
    dotenvy::dotenv().ok();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let store = ProgressStore::new(&redis_url).expect("store");

    let post_id = format!("it-{}", uuid::Uuid::new_v4());

    // Unknown posts report the default floor.
    assert_eq!(store.max_progress(&post_id).await, 30.0);

    store.set_max_progress(&post_id, 65.0).await;
    assert_eq!(store.max_progress(&post_id).await, 65.0);

    store.mark_completed(&post_id, "m1").await;
    store.mark_completed(&post_id, "m1").await;
    store.mark_completed(&post_id, "m2").await;
    assert_eq!(store.completed(&post_id).await, vec!["m1", "m2"]);

    let result = ItemResult::Image(ImageResult {
        media_id: "m1".into(),
        original_name: "pic.jpg".into(),
        filename: "pic.jpg".into(),
        status: PostStatus::Success,
        original_url: Some("https://cdn/pic.jpg".into()),
        image_url: Some("https://cdn/pic_processed.jpg".into()),
        blurred_thumbnail_url: None,
    });
    store.set_result(&post_id, "m1", &result).await;
    assert_eq!(store.result(&post_id, "m1").await, Some(result.clone()));

    let all = store.all_results(&post_id).await;
    assert_eq!(all, vec![result]);
}
