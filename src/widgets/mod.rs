//! Read-only view selectors for the dashboard panels.
//!
//! Widgets hold no state of their own: each selector takes the stores and
//! returns exactly the slice a panel renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    BackgroundJob, HealthStatus, JobStatus, Notification, ServiceHealth, Severity, SystemEvent,
};
use crate::store::Stores;
use crate::toast::{Toast, Toaster};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub limit: usize,
    #[serde(default)]
    pub min_severity: Option<Severity>,
    #[serde(default)]
    pub source: Option<String>,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            limit: 10,
            min_severity: None,
            source: None,
        }
    }
}

/// Newest-first events passing `filter`, at most `filter.limit` of them.
pub fn activity_feed(stores: &Stores, filter: &ActivityFilter) -> Vec<SystemEvent> {
    stores
        .events
        .list()
        .into_iter()
        .filter(|event| filter.min_severity.map_or(true, |min| event.severity >= min))
        .filter(|event| {
            filter
                .source
                .as_deref()
                .map_or(true, |source| event.source == source)
        })
        .take(filter.limit)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub retrying: usize,
    pub cancelled: usize,
}

impl JobCounts {
    fn bump(&mut self, status: JobStatus) {
        let slot = match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Retrying => &mut self.retrying,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
    }

    pub fn active(&self) -> usize {
        self.pending + self.running + self.retrying
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobQueueView {
    /// Newest first.
    pub jobs: Vec<BackgroundJob>,
    pub counts: JobCounts,
}

/// Jobs for the queue panel, optionally restricted to one status. Counts
/// always cover the whole queue.
pub fn job_queue(stores: &Stores, status: Option<JobStatus>, limit: usize) -> JobQueueView {
    let all = stores.jobs.list();
    let mut counts = JobCounts::default();
    for job in &all {
        counts.bump(job.status);
    }
    let jobs = all
        .into_iter()
        .rev()
        .filter(|job| status.map_or(true, |wanted| job.status == wanted))
        .take(limit)
        .collect();
    JobQueueView { jobs, counts }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthOverview {
    pub services: Vec<ServiceHealth>,
    pub overall: HealthStatus,
    pub mean_latency_ms: Option<f64>,
    pub last_check: Option<DateTime<Utc>>,
}

/// Overall status is the worst service's status, or unknown before the
/// first snapshot.
pub fn system_health(stores: &Stores) -> HealthOverview {
    let services = stores.services.list();
    let overall = services
        .iter()
        .map(|service| service.status)
        .max_by_key(HealthStatus::rank)
        .unwrap_or(HealthStatus::Unknown);
    let mean_latency_ms = if services.is_empty() {
        None
    } else {
        let total: f64 = services.iter().map(|service| f64::from(service.latency)).sum();
        Some(total / services.len() as f64)
    };
    let last_check = services.iter().map(|service| service.last_check).max();
    HealthOverview {
        services,
        overall,
        mean_latency_ms,
        last_check,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationCenter {
    pub latest: Vec<Notification>,
    pub unread: usize,
}

pub fn notification_center(stores: &Stores, limit: usize) -> NotificationCenter {
    let notifications = stores.notifications.list();
    let unread = notifications.iter().filter(|n| !n.read).count();
    NotificationCenter {
        latest: notifications.into_iter().take(limit).collect(),
        unread,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelLimits {
    pub events: usize,
    pub jobs: usize,
    pub notifications: usize,
}

impl Default for PanelLimits {
    fn default() -> Self {
        Self {
            events: 10,
            jobs: 10,
            notifications: 5,
        }
    }
}

/// Everything the war room page renders, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarRoomSnapshot {
    pub generated_at: DateTime<Utc>,
    pub revision: u64,
    pub activity: Vec<SystemEvent>,
    pub jobs: JobQueueView,
    pub health: HealthOverview,
    pub notifications: NotificationCenter,
    pub toasts: Vec<Toast>,
}

pub fn war_room(stores: &Stores, toaster: Option<&Toaster>, limits: PanelLimits) -> WarRoomSnapshot {
    WarRoomSnapshot {
        generated_at: Utc::now(),
        revision: stores.revision(),
        activity: activity_feed(
            stores,
            &ActivityFilter {
                limit: limits.events,
                ..ActivityFilter::default()
            },
        ),
        jobs: job_queue(stores, None, limits.jobs),
        health: system_health(stores),
        notifications: notification_center(stores, limits.notifications),
        toasts: toaster.map(Toaster::list).unwrap_or_default(),
    }
}
