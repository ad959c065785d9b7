use std::collections::VecDeque;
use std::sync::Mutex;

use crate::bus::event_types::{CATEGORY_NOTIFICATION, NOTIFICATION_ADDED, NOTIFICATION_READ};
use crate::core::Notification;

use super::{StoreContext, StoreError};

/// Notification center contents, newest first, bounded to `capacity`.
pub struct NotificationStore {
    ctx: StoreContext,
    capacity: usize,
    notifications: Mutex<VecDeque<Notification>>,
}

impl NotificationStore {
    pub(crate) fn new(ctx: StoreContext, capacity: usize) -> Self {
        Self {
            ctx,
            capacity: capacity.max(1),
            notifications: Mutex::new(VecDeque::new()),
        }
    }

    pub fn add_notification(&self, notification: Notification) -> Notification {
        {
            let mut notifications = self
                .notifications
                .lock()
                .expect("notification store mutex poisoned");
            notifications.push_front(notification.clone());
            notifications.truncate(self.capacity);
        }
        self.ctx
            .record(CATEGORY_NOTIFICATION, NOTIFICATION_ADDED, &notification);
        notification
    }

    pub fn mark_read(&self, id: &str) -> Result<Notification, StoreError> {
        let updated = {
            let mut notifications = self
                .notifications
                .lock()
                .expect("notification store mutex poisoned");
            let entry = notifications
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if entry.read {
                return Ok(entry.clone());
            }
            entry.read = true;
            entry.clone()
        };
        self.ctx
            .record(CATEGORY_NOTIFICATION, NOTIFICATION_READ, &updated);
        Ok(updated)
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_read(&self) -> usize {
        let ids: Vec<String> = {
            let mut notifications = self
                .notifications
                .lock()
                .expect("notification store mutex poisoned");
            notifications
                .iter_mut()
                .filter(|n| !n.read)
                .map(|n| {
                    n.read = true;
                    n.id.clone()
                })
                .collect()
        };
        if !ids.is_empty() {
            self.ctx.record(
                CATEGORY_NOTIFICATION,
                NOTIFICATION_READ,
                &serde_json::json!({ "ids": ids }),
            );
        }
        ids.len()
    }

    pub fn list(&self) -> Vec<Notification> {
        let notifications = self
            .notifications
            .lock()
            .expect("notification store mutex poisoned");
        notifications.iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        let notifications = self
            .notifications
            .lock()
            .expect("notification store mutex poisoned");
        notifications.iter().filter(|n| !n.read).count()
    }
}
