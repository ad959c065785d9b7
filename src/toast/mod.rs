//! Transient, self-expiring messages shown on top of the dashboard.
//!
//! Toasts live outside the main stores. Each one owns an expiry timer task:
//! after its duration it is marked `leaving` for the fade-out grace period
//! and then removed. `dismiss` removes a toast at once and aborts its timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bus::event_types::{CATEGORY_TOAST, TOAST_LEAVING, TOAST_POSTED, TOAST_REMOVED};
use crate::bus::EventBus;
use crate::config::ToastConfig;
use crate::core::NoticeKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    /// Fading out; removal follows after the grace period.
    pub leaving: bool,
}

struct ToasterInner {
    bus: Arc<EventBus>,
    config: ToastConfig,
    toasts: Mutex<Vec<Toast>>,
    timers: DashMap<String, JoinHandle<()>>,
}

/// Cheap to clone; clones share the same set of toasts.
#[derive(Clone)]
pub struct Toaster {
    inner: Arc<ToasterInner>,
}

impl Toaster {
    pub fn new(bus: Arc<EventBus>, config: ToastConfig) -> Self {
        Self {
            inner: Arc::new(ToasterInner {
                bus,
                config,
                toasts: Mutex::new(Vec::new()),
                timers: DashMap::new(),
            }),
        }
    }

    /// Post a toast with the configured default duration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn post(&self, kind: NoticeKind, title: impl Into<String>, message: Option<String>) -> Toast {
        let duration = Duration::from_millis(self.inner.config.default_duration_ms);
        self.post_for(kind, title, message, duration)
    }

    /// Post a toast that expires after `duration`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn post_for(
        &self,
        kind: NoticeKind,
        title: impl Into<String>,
        message: Option<String>,
        duration: Duration,
    ) -> Toast {
        let toast = Toast {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message,
            duration_ms: duration.as_millis() as u64,
            created_at: Utc::now(),
            leaving: false,
        };

        {
            // The timer removes itself from `timers` only after taking this
            // lock, so it cannot run ahead of the insert below.
            let mut toasts = self.inner.toasts.lock().expect("toaster mutex poisoned");
            toasts.push(toast.clone());
            let handle = tokio::spawn(expire(self.inner.clone(), toast.id.clone(), duration));
            self.inner.timers.insert(toast.id.clone(), handle);
        }

        tracing::debug!(id = %toast.id, kind = %toast.kind, "toast posted");
        self.inner.bus.emit_value(CATEGORY_TOAST, TOAST_POSTED, &toast);
        toast
    }

    /// Remove a toast immediately and cancel its expiry. Returns false when
    /// the toast was already gone.
    pub fn dismiss(&self, id: &str) -> bool {
        if let Some((_, timer)) = self.inner.timers.remove(id) {
            timer.abort();
        }
        let removed = self.inner.remove(id);
        if removed {
            self.inner.bus.emit(
                CATEGORY_TOAST,
                TOAST_REMOVED,
                serde_json::json!({ "id": id, "reason": "dismissed" }),
            );
        }
        removed
    }

    /// Dismiss everything.
    pub fn clear(&self) {
        for toast in self.list() {
            self.dismiss(&toast.id);
        }
    }

    /// Active toasts in the order they were posted.
    pub fn list(&self) -> Vec<Toast> {
        self.inner
            .toasts
            .lock()
            .expect("toaster mutex poisoned")
            .clone()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.len()
    }
}

impl ToasterInner {
    fn remove(&self, id: &str) -> bool {
        let mut toasts = self.toasts.lock().expect("toaster mutex poisoned");
        let before = toasts.len();
        toasts.retain(|toast| toast.id != id);
        toasts.len() != before
    }

    fn mark_leaving(&self, id: &str) -> bool {
        let mut toasts = self.toasts.lock().expect("toaster mutex poisoned");
        match toasts.iter_mut().find(|toast| toast.id == id) {
            Some(toast) => {
                toast.leaving = true;
                true
            }
            None => false,
        }
    }
}

async fn expire(inner: Arc<ToasterInner>, id: String, duration: Duration) {
    tokio::time::sleep(duration).await;

    let fade = Duration::from_millis(inner.config.fade_out_ms);
    if !fade.is_zero() {
        if !inner.mark_leaving(&id) {
            inner.timers.remove(&id);
            return;
        }
        inner
            .bus
            .emit(CATEGORY_TOAST, TOAST_LEAVING, serde_json::json!({ "id": id }));
        tokio::time::sleep(fade).await;
    }

    let removed = inner.remove(&id);
    inner.timers.remove(&id);
    if removed {
        tracing::debug!(id = %id, "toast expired");
        inner.bus.emit(
            CATEGORY_TOAST,
            TOAST_REMOVED,
            serde_json::json!({ "id": id, "reason": "expired" }),
        );
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    fn toaster(fade_out_ms: u64) -> Toaster {
        Toaster::new(
            Arc::new(EventBus::new()),
            ToastConfig {
                default_duration_ms: 5_000,
                fade_out_ms,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn toast_expires_after_duration_and_grace() {
        let toaster = toaster(300);
        let toast = toaster.post(NoticeKind::Success, "Saved", None);
        assert_eq!(toast.duration_ms, 5_000);

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(toaster.list(), vec![toast.clone()]);

        sleep(Duration::from_millis(200)).await;
        let fading = toaster.list();
        assert_eq!(fading.len(), 1);
        assert!(fading[0].leaving);

        sleep(Duration::from_millis(300)).await;
        assert!(toaster.list().is_empty());
        assert_eq!(toaster.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_grace_removes_without_leaving_state() {
        let toaster = toaster(0);
        toaster.post_for(NoticeKind::Info, "Heads up", None, Duration::from_millis(100));

        sleep(Duration::from_millis(101)).await;
        assert!(toaster.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_removes_immediately_and_cancels_timer() {
        let toaster = toaster(300);
        let keep = toaster.post(NoticeKind::Info, "Keep", None);
        let gone = toaster.post(NoticeKind::Error, "Gone", Some("connection lost".into()));
        assert_eq!(toaster.pending_timers(), 2);

        assert!(toaster.dismiss(&gone.id));
        assert_eq!(toaster.list(), vec![keep.clone()]);
        assert_eq!(toaster.pending_timers(), 1);

        // Second dismiss and the old deadline are both harmless.
        assert!(!toaster.dismiss(&gone.id));
        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(toaster.list(), vec![keep]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_during_fade_out() {
        let toaster = toaster(300);
        let toast = toaster.post_for(NoticeKind::Warning, "Slow", None, Duration::from_millis(100));

        sleep(Duration::from_millis(150)).await;
        assert!(toaster.list()[0].leaving);
        assert!(toaster.dismiss(&toast.id));

        sleep(Duration::from_millis(500)).await;
        assert!(toaster.list().is_empty());
        assert_eq!(toaster.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_toasts_keep_insertion_order_and_expire_independently() {
        let toaster = toaster(0);
        let long = toaster.post_for(NoticeKind::Info, "long", None, Duration::from_millis(500));
        let short = toaster.post_for(NoticeKind::Info, "short", None, Duration::from_millis(100));
        let mid = toaster.post_for(NoticeKind::Info, "mid", None, Duration::from_millis(300));

        let titles = |t: &Toaster| t.list().into_iter().map(|toast| toast.title).collect::<Vec<_>>();
        assert_eq!(titles(&toaster), vec!["long", "short", "mid"]);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(titles(&toaster), vec!["long", "mid"]);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(titles(&toaster), vec!["long"]);
        assert_eq!(toaster.list()[0].id, long.id);
        assert_ne!(short.id, mid.id);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let toaster = toaster(300);
        for i in 0..3 {
            toaster.post(NoticeKind::Info, format!("toast {i}"), None);
        }

        toaster.clear();

        assert!(toaster.list().is_empty());
        assert_eq!(toaster.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_is_published() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let toaster = Toaster::new(bus, ToastConfig::default());

        let toast = toaster.post_for(NoticeKind::Success, "Done", None, Duration::from_millis(10));
        sleep(Duration::from_secs(1)).await;

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.payload["id"], toast.id);
            types.push(event.event_type);
        }
        assert_eq!(types, vec![TOAST_POSTED, TOAST_LEAVING, TOAST_REMOVED]);
    }
}
