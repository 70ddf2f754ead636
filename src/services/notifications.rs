//! In-app notifications and the live notification feed

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::realtime::{ChangeKind, PostgresChanges, RealtimeClient, Subscription};
use crate::repository::NotificationGateway;

/// Per-device notification settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl NotificationPreferences {
    /// Read saved preferences; a missing or unreadable file yields the defaults
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring corrupt notification preferences: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// New notifications for one member as they are inserted
#[derive(Debug)]
pub struct NotificationFeed {
    subscription: Subscription,
}

impl NotificationFeed {
    /// The next notification; rows that fail to decode are skipped
    pub async fn next(&mut self) -> Option<Result<Notification>> {
        loop {
            match self.subscription.next().await? {
                Ok(change) => match change.record_as::<Notification>() {
                    Ok(notification) => return Some(Ok(notification)),
                    Err(e) => {
                        warn!("skipping undecodable notification: {}", e);
                        continue;
                    }
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

pub struct NotificationService {
    notifications: Arc<dyn NotificationGateway>,
    user_id: Uuid,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationGateway>, user_id: Uuid) -> Self {
        Self {
            notifications,
            user_id,
        }
    }

    /// The member's notifications, newest first
    pub async fn list(&self) -> Result<Vec<Notification>> {
        let mut rows = self.notifications.list_notifications(self.user_id).await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Unread notifications across the whole inbox, not just the listed page
    pub async fn unread_count(&self) -> Result<usize> {
        self.notifications.count_unread(self.user_id).await
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> Result<()> {
        self.notifications.mark_read(notification_id).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.notifications.mark_all_read(self.user_id).await
    }

    /// Notify another member
    pub async fn send(&self, notification: NewNotification) -> Result<()> {
        notification.validate()?;
        self.notifications.create_notification(&notification).await?;
        debug!(user_id = %notification.user_id, "notification sent");
        Ok(())
    }

    /// Live feed of new notifications, or `None` when the member opted out
    pub async fn subscribe(
        &self,
        realtime: &RealtimeClient,
        preferences: &NotificationPreferences,
    ) -> Result<Option<NotificationFeed>> {
        if !preferences.enabled {
            info!("notifications disabled, not subscribing");
            return Ok(None);
        }
        let subscription = realtime
            .subscribe(
                &format!("notifications:{}", self.user_id),
                vec![PostgresChanges::new(ChangeKind::Insert, "notifications").eq("user_id", self.user_id)],
            )
            .await?;
        Ok(Some(NotificationFeed { subscription }))
    }
}
