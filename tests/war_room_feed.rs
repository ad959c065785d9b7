//! End-to-end behaviour of the live feed, stores, toasts and event stream.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use common::{eager_feed_config, RecordingSink};
use warroom_lib::bus::event_types::{
    EVENT_ADDED, FEED_STARTED, FEED_STOPPED, HEALTH_REFRESHED, JOB_COMPLETED, NOTIFICATION_ADDED,
    TOAST_POSTED, TOAST_REMOVED,
};
use warroom_lib::bus::{EventBatcher, EventBus};
use warroom_lib::config::ToastConfig;
use warroom_lib::core::{BackgroundJob, HealthStatus, JobStatus, NoticeKind};
use warroom_lib::feed::{FeedPoller, MockFeed, SERVICE_NAMES};
use warroom_lib::store::{StoreLimits, Stores};
use warroom_lib::toast::Toaster;
use warroom_lib::widgets::{self, PanelLimits};

#[tokio::test(start_paused = true)]
async fn seeded_dashboard_runs_and_streams_changes() {
    let bus = Arc::new(EventBus::new());
    let stores = Arc::new(Stores::new(bus.clone(), StoreLimits::default()));
    let sink = Arc::new(RecordingSink::default());
    let batcher = EventBatcher::start(bus.subscribe(), sink.clone());

    let config = eager_feed_config(17);
    let mut feed = MockFeed::new(&config);
    feed.seed(&stores, Utc::now()).unwrap();
    let running: Vec<String> = stores
        .jobs
        .with_status(JobStatus::Running)
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(running.len(), 2);

    let mut poller = FeedPoller::start(&config, Box::new(feed), stores.clone());

    // Sample progress halfway between ticks; it must never go backwards.
    sleep(config.poll_interval() / 2).await;
    let mut last_seen: HashMap<String, u8> = HashMap::new();
    for _ in 0..12 {
        sleep(config.poll_interval()).await;
        for id in &running {
            let job = stores.jobs.get(id).unwrap();
            let previous = last_seen.insert(id.clone(), job.progress).unwrap_or(0);
            assert!(job.progress >= previous, "job {id} went {previous} -> {}", job.progress);
            if job.status == JobStatus::Completed {
                assert_eq!(job.progress, 100);
                assert!(job.completed_at.is_some());
            }
        }
    }

    // 12 ticks of at least 5% each finish both seeded jobs.
    for id in &running {
        assert_eq!(stores.jobs.get(id).unwrap().status, JobStatus::Completed);
    }

    poller.stop().await;
    let snapshot = widgets::war_room(&stores, None, PanelLimits::default());
    assert_eq!(snapshot.jobs.counts.running, 0);
    assert_eq!(snapshot.activity.len(), 10);
    assert_eq!(snapshot.notifications.unread, 12);
    assert_eq!(snapshot.health.services.len(), SERVICE_NAMES.len());
    assert_ne!(snapshot.health.overall, HealthStatus::Unknown);

    drop(poller);
    drop(stores);
    drop(bus);
    batcher.await.unwrap();

    assert_eq!(sink.count(FEED_STARTED), 1);
    assert_eq!(sink.count(FEED_STOPPED), 1);
    assert_eq!(sink.count(JOB_COMPLETED), 2);
    // 5 seeded events plus one per tick.
    assert_eq!(sink.count(EVENT_ADDED), 5 + 12);
    assert_eq!(sink.count(NOTIFICATION_ADDED), 12);
    assert_eq!(sink.count(HEALTH_REFRESHED), 1 + 12);

    let events = sink.events();
    let seqs: Vec<u64> = events.iter().map(|event| event.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted, "sink saw events out of order");
}

#[tokio::test(start_paused = true)]
async fn stopping_the_feed_freezes_the_stores() {
    let stores = Arc::new(Stores::detached());
    stores
        .jobs
        .add_job(BackgroundJob::new("Slow scan", "security", 0).with_status(JobStatus::Running, 0))
        .unwrap();
    let config = eager_feed_config(23);
    let mut poller = FeedPoller::start(&config, Box::new(MockFeed::new(&config)), stores.clone());

    sleep(Duration::from_millis(350)).await;
    assert_eq!(poller.ticks(), 3);

    poller.stop().await;
    let frozen = widgets::war_room(&stores, None, PanelLimits::default());
    sleep(config.poll_interval() * 2).await;
    let later = widgets::war_room(&stores, None, PanelLimits::default());

    assert_eq!(later.revision, frozen.revision);
    assert_eq!(later.activity, frozen.activity);
    assert_eq!(later.jobs, frozen.jobs);
}

#[tokio::test(start_paused = true)]
async fn toasts_ride_the_same_event_stream() {
    let bus = Arc::new(EventBus::new());
    let sink = Arc::new(RecordingSink::default());
    let batcher = EventBatcher::start(bus.subscribe(), sink.clone());
    let toaster = Toaster::new(
        bus.clone(),
        ToastConfig {
            default_duration_ms: 200,
            fade_out_ms: 50,
        },
    );

    let expiring = toaster.post(NoticeKind::Info, "Snapshot exported", None);
    let dismissed = toaster.post(NoticeKind::Error, "Export failed", Some("disk full".into()));
    assert!(toaster.dismiss(&dismissed.id));
    assert!(!toaster.dismiss(&dismissed.id));

    sleep(Duration::from_millis(400)).await;
    assert!(toaster.list().is_empty());

    drop(toaster);
    drop(bus);
    batcher.await.unwrap();

    assert_eq!(sink.count(TOAST_POSTED), 2);
    assert_eq!(sink.count(TOAST_REMOVED), 2);
    let reasons: Vec<(String, String)> = sink
        .events()
        .into_iter()
        .filter(|event| event.event_type == TOAST_REMOVED)
        .map(|event| {
            (
                event.payload["id"].as_str().unwrap_or_default().to_string(),
                event.payload["reason"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            (dismissed.id, "dismissed".to_string()),
            (expiring.id, "expired".to_string()),
        ]
    );
}
