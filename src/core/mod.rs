//! Shared domain types for the war room: events, jobs, service health and
//! notifications.

pub mod event;
pub mod health;
pub mod job;
pub mod notification;

pub use event::{Severity, SystemEvent};
pub use health::{HealthStatus, ServiceHealth};
pub use job::{BackgroundJob, JobPatch, JobStatus, MAX_PROGRESS};
pub use notification::{NoticeKind, Notification};
