use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::FeedConfig;
use crate::core::{
    BackgroundJob, HealthStatus, JobPatch, JobStatus, NoticeKind, Notification, ServiceHealth,
    Severity, SystemEvent, MAX_PROGRESS,
};
use crate::store::{StoreError, Stores};

use super::{FeedCancel, LiveFeed, TickReport};

const EVENT_TYPES: &[&str] = &[
    "user_login",
    "api_request",
    "job_started",
    "job_completed",
    "config_change",
    "security_alert",
];

const EVENT_SOURCES: &[&str] = &["api", "worker", "scheduler", "auth", "database"];

const EVENT_MESSAGES: &[&str] = &[
    "User authentication successful",
    "API rate limit threshold reached",
    "Background job processing started",
    "Database connection pool expanded",
    "Cache invalidation completed",
    "Unusual login pattern detected",
];

const NOTIFICATION_TITLE: &str = "System Update";
const NOTIFICATION_MESSAGE: &str = "New data available";

/// Progress added to each running job per tick, drawn from `[5, 20)`.
const PROGRESS_STEP: std::ops::Range<u8> = 5..20;

pub const SERVICE_NAMES: [&str; 4] = ["API", "Database", "Redis", "Storage"];

/// Per-service ranges the health snapshot is redrawn from.
struct ServiceProfile {
    name: &'static str,
    latency_ms: std::ops::Range<u32>,
    uptime_pct: std::ops::Range<f64>,
    can_degrade: bool,
}

const SERVICE_PROFILES: [ServiceProfile; 4] = [
    ServiceProfile {
        name: SERVICE_NAMES[0],
        latency_ms: 20..100,
        uptime_pct: 99.5..100.0,
        can_degrade: false,
    },
    ServiceProfile {
        name: SERVICE_NAMES[1],
        latency_ms: 5..50,
        uptime_pct: 99.9..100.0,
        can_degrade: false,
    },
    ServiceProfile {
        name: SERVICE_NAMES[2],
        latency_ms: 1..10,
        uptime_pct: 99.95..100.0,
        can_degrade: false,
    },
    ServiceProfile {
        name: SERVICE_NAMES[3],
        latency_ms: 30..150,
        uptime_pct: 99.0..100.0,
        can_degrade: true,
    },
];

/// Randomized stand-in for a backend feed.
pub struct MockFeed {
    event_probability: f64,
    notification_probability: f64,
    health_refresh_probability: f64,
    storage_degraded_probability: f64,
    rng: StdRng,
}

impl MockFeed {
    pub fn new(config: &FeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            event_probability: config.event_probability,
            notification_probability: config.notification_probability,
            health_refresh_probability: config.health_refresh_probability,
            storage_degraded_probability: config.storage_degraded_probability,
            rng,
        }
    }

    /// Populate empty stores so the dashboard has something to show before
    /// the first tick.
    pub fn seed(&mut self, stores: &Stores, now: DateTime<Utc>) -> Result<(), StoreError> {
        let jobs = [
            ("Daily Report Generation", "reports", JobStatus::Running, 45, 0),
            ("Threat Intel Sync", "ingest", JobStatus::Running, 70, 0),
            ("Email Notifications", "notifications", JobStatus::Pending, 0, 0),
            ("Data Backup", "maintenance", JobStatus::Completed, 100, 0),
            ("Log Rotation", "maintenance", JobStatus::Failed, 35, 1),
        ];
        for (offset, (name, queue, status, progress, retries)) in jobs.into_iter().enumerate() {
            let mut job = BackgroundJob::new(name, queue, 3).with_status(status, progress);
            job.retry_count = retries;
            job.created_at = now - Duration::minutes(10 * (offset as i64 + 1));
            if status.is_terminal() {
                job.completed_at = Some(now - Duration::minutes(offset as i64));
            }
            stores.jobs.add_job(job)?;
        }

        for minutes_ago in (1..=5).rev() {
            let event = self.random_event(now - Duration::minutes(minutes_ago));
            stores.events.add_event(event);
        }

        stores.services.set_services(self.health_snapshot(now));
        Ok(())
    }

    /// One uncancellable tick; see [`MockFeed::tick_with`].
    pub fn tick_at(&mut self, stores: &Stores, now: DateTime<Utc>) -> TickReport {
        self.tick_with(stores, &FeedCancel::new(), now)
    }

    /// Synchronous body of `LiveFeed::tick`. Stops at the first write
    /// refused by `cancel`.
    pub fn tick_with(&mut self, stores: &Stores, cancel: &FeedCancel, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        if self.chance(self.event_probability) {
            let event = self.random_event(now);
            let Some(event) = cancel.write(|| stores.events.add_event(event)) else {
                return report;
            };
            report.event_id = Some(event.id);
        }

        for job in stores.jobs.with_status(JobStatus::Running) {
            let step = self.rng.gen_range(PROGRESS_STEP);
            let next = job.progress.saturating_add(step);
            let patch = if next >= MAX_PROGRESS {
                JobPatch {
                    status: Some(JobStatus::Completed),
                    progress: Some(MAX_PROGRESS),
                    completed_at: Some(now),
                    ..JobPatch::default()
                }
            } else {
                JobPatch::progress(next)
            };
            let Some(result) = cancel.write(|| stores.jobs.update_job(&job.id, patch)) else {
                return report;
            };
            match result {
                Ok(updated) if updated.status == JobStatus::Completed => {
                    report.completed_jobs.push(updated.id)
                }
                Ok(updated) => report.advanced_jobs.push(updated.id),
                // The job changed between listing and updating (cancelled, say).
                Err(e) => tracing::debug!("skipping job {}: {e}", job.id),
            }
        }

        if self.chance(self.notification_probability) {
            let kind = *NoticeKind::all()
                .choose(&mut self.rng)
                .unwrap_or(&NoticeKind::Info);
            let notification = Notification::new(kind, NOTIFICATION_TITLE, NOTIFICATION_MESSAGE, now);
            let Some(notification) =
                cancel.write(|| stores.notifications.add_notification(notification))
            else {
                return report;
            };
            report.notification_id = Some(notification.id);
        }

        if self.chance(self.health_refresh_probability) {
            let snapshot = self.health_snapshot(now);
            if cancel.write(|| stores.services.set_services(snapshot)).is_none() {
                return report;
            }
            report.health_refreshed = true;
        }

        report
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    fn pick(&mut self, options: &[&'static str]) -> &'static str {
        options.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn random_event(&mut self, now: DateTime<Utc>) -> SystemEvent {
        let event_type = self.pick(EVENT_TYPES);
        let severity = *Severity::all()
            .choose(&mut self.rng)
            .unwrap_or(&Severity::Info);
        let source = self.pick(EVENT_SOURCES);
        let message = self.pick(EVENT_MESSAGES);
        SystemEvent::new(event_type, severity, message, source, now)
    }

    fn health_snapshot(&mut self, now: DateTime<Utc>) -> Vec<ServiceHealth> {
        SERVICE_PROFILES
            .iter()
            .map(|profile| {
                let degraded = profile.can_degrade && self.chance(self.storage_degraded_probability);
                ServiceHealth {
                    name: profile.name.to_string(),
                    status: if degraded {
                        HealthStatus::Degraded
                    } else {
                        HealthStatus::Healthy
                    },
                    latency: self.rng.gen_range(profile.latency_ms.clone()),
                    uptime: self.rng.gen_range(profile.uptime_pct.clone()),
                    last_check: now,
                }
            })
            .collect()
    }
}

#[async_trait]
impl LiveFeed for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn tick(&mut self, stores: &Stores, cancel: &FeedCancel, now: DateTime<Utc>) -> TickReport {
        self.tick_with(stores, cancel, now)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(seed: u64) -> FeedConfig {
        FeedConfig {
            seed: Some(seed),
            ..FeedConfig::default()
        }
    }

    fn always(seed: u64) -> FeedConfig {
        FeedConfig {
            event_probability: 1.0,
            notification_probability: 1.0,
            health_refresh_probability: 1.0,
            ..config(seed)
        }
    }

    fn never(seed: u64) -> FeedConfig {
        FeedConfig {
            event_probability: 0.0,
            notification_probability: 0.0,
            health_refresh_probability: 0.0,
            ..config(seed)
        }
    }

    #[test]
    fn running_jobs_strictly_advance_then_stay_completed() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&never(1));
        let job = stores
            .jobs
            .add_job(BackgroundJob::new("Report", "reports", 0).with_status(JobStatus::Running, 0))
            .unwrap();

        let mut last = 0;
        let mut ticks = 0;
        loop {
            feed.tick_at(&stores, Utc::now());
            ticks += 1;
            let current = stores.jobs.get(&job.id).unwrap();
            assert!(current.progress > last || current.progress == MAX_PROGRESS);
            last = current.progress;
            if current.status == JobStatus::Completed {
                break;
            }
            assert_eq!(current.status, JobStatus::Running);
            assert!(ticks <= 20, "job never completed");
        }

        let finished = stores.jobs.get(&job.id).unwrap();
        let revision = stores.revision();
        for _ in 0..5 {
            feed.tick_at(&stores, Utc::now());
        }
        assert_eq!(stores.jobs.get(&job.id).unwrap(), finished);
        assert_eq!(stores.revision(), revision);
    }

    #[test]
    fn each_step_is_between_five_and_twenty() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&never(2));
        let job = stores
            .jobs
            .add_job(BackgroundJob::new("Index", "search", 0).with_status(JobStatus::Running, 0))
            .unwrap();

        for _ in 0..4 {
            let before = stores.jobs.get(&job.id).unwrap().progress;
            feed.tick_at(&stores, Utc::now());
            let after = stores.jobs.get(&job.id).unwrap().progress;
            assert!((5..20).contains(&(after - before)), "step was {}", after - before);
        }
    }

    #[test]
    fn job_at_92_clamps_and_completes_on_a_large_step() {
        let mut completions = 0;
        for seed in 0..20 {
            let stores = Stores::detached();
            let mut feed = MockFeed::new(&never(seed));
            let job = stores
                .jobs
                .add_job(BackgroundJob::new("Export", "exports", 0).with_status(JobStatus::Running, 92))
                .unwrap();
            let tick_time = Utc::now();

            let report = feed.tick_at(&stores, tick_time);

            let after = stores.jobs.get(&job.id).unwrap();
            if after.status == JobStatus::Completed {
                // A step of 8 or more overshoots and is clamped.
                completions += 1;
                assert_eq!(after.progress, 100);
                assert!(after.completed_at.unwrap() >= tick_time);
                assert_eq!(report.completed_jobs, vec![job.id]);
            } else {
                assert_eq!(after.status, JobStatus::Running);
                assert!((97..100).contains(&after.progress), "progress {}", after.progress);
                assert_eq!(report.advanced_jobs, vec![job.id]);
            }
        }
        assert!(completions > 0, "no seed drew a step of 8 or more");
    }

    #[test]
    fn pending_and_failed_jobs_are_left_alone() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&never(4));
        let pending = stores.jobs.add_job(BackgroundJob::new("Queued", "default", 0)).unwrap();

        let report = feed.tick_at(&stores, Utc::now());

        assert!(report.is_empty());
        assert_eq!(stores.jobs.get(&pending.id).unwrap(), pending);
    }

    #[test]
    fn event_rate_matches_probability() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&config(2024));
        let ticks = 10_000;

        let produced = (0..ticks)
            .filter(|_| feed.tick_at(&stores, Utc::now()).event_id.is_some())
            .count();

        let rate = produced as f64 / ticks as f64;
        assert!((rate - 0.3).abs() < 0.02, "event rate {rate}");
    }

    #[test]
    fn health_refresh_yields_four_fixed_services() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&always(5));

        for _ in 0..50 {
            let report = feed.tick_at(&stores, Utc::now());
            assert!(report.health_refreshed);

            let services = stores.services.list();
            let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, SERVICE_NAMES.to_vec());
            for service in &services {
                assert!(matches!(
                    service.status,
                    HealthStatus::Healthy | HealthStatus::Degraded
                ));
                if service.name != "Storage" {
                    assert_eq!(service.status, HealthStatus::Healthy);
                }
                assert!(service.uptime >= 99.0 && service.uptime < 100.0);
            }
        }
    }

    #[test]
    fn storage_degrade_rate_and_notification_kinds() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&FeedConfig {
            event_probability: 0.0,
            notification_probability: 1.0,
            health_refresh_probability: 1.0,
            ..config(2025)
        });
        let ticks = 5_000;
        let mut degraded = 0;
        let mut kinds = std::collections::HashSet::new();

        for _ in 0..ticks {
            feed.tick_at(&stores, Utc::now());
            if stores.services.get("Storage").unwrap().status == HealthStatus::Degraded {
                degraded += 1;
            }
            kinds.insert(stores.notifications.list()[0].kind);
        }

        let rate = degraded as f64 / ticks as f64;
        assert!((rate - 0.1).abs() < 0.02, "storage degraded rate {rate}");
        assert_eq!(kinds.len(), NoticeKind::all().len());
    }

    #[test]
    fn storage_degrades_when_forced() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&FeedConfig {
            storage_degraded_probability: 1.0,
            ..always(6)
        });

        feed.tick_at(&stores, Utc::now());

        assert_eq!(
            stores.services.get("Storage").unwrap().status,
            HealthStatus::Degraded
        );
    }

    #[test]
    fn notifications_use_fixed_copy_and_start_unread() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&always(7));

        let report = feed.tick_at(&stores, Utc::now());

        let notifications = stores.notifications.list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(Some(notifications[0].id.clone()), report.notification_id);
        assert_eq!(notifications[0].title, NOTIFICATION_TITLE);
        assert_eq!(notifications[0].message, NOTIFICATION_MESSAGE);
        assert!(!notifications[0].read);
    }

    #[test]
    fn same_seed_same_stream() {
        let a = Stores::detached();
        let b = Stores::detached();
        let mut feed_a = MockFeed::new(&config(99));
        let mut feed_b = MockFeed::new(&config(99));
        let now = Utc::now();

        for _ in 0..200 {
            feed_a.tick_at(&a, now);
            feed_b.tick_at(&b, now);
        }

        let describe = |stores: &Stores| -> Vec<(String, Severity, String)> {
            stores
                .events
                .list()
                .into_iter()
                .map(|e| (e.event_type, e.severity, e.message))
                .collect()
        };
        assert_eq!(describe(&a), describe(&b));
    }

    #[test]
    fn seed_populates_every_store() {
        let stores = Stores::detached();
        let mut feed = MockFeed::new(&config(8));

        feed.seed(&stores, Utc::now()).unwrap();

        assert_eq!(stores.jobs.list().len(), 5);
        assert_eq!(stores.jobs.with_status(JobStatus::Running).len(), 2);
        assert_eq!(stores.events.len(), 5);
        assert_eq!(stores.services.list().len(), 4);
        assert!(stores.notifications.list().is_empty());
    }
}
