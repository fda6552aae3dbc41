use chrono::Duration;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::notification::{Notification, NotificationType};
use crate::models::user::Caller;
use crate::services::db::Database;

/// notifications outlive their moment by this much, then housekeeping
/// outside the core sweeps them away
pub const NOTIFICATION_TTL_DAYS: i64 = 30;

/// optional entity references carried on a notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NotificationRefs {
    pub project: Option<Uuid>,
    pub meeting: Option<Uuid>,
}

impl NotificationRefs {
    pub fn project(id: Uuid) -> Self {
        Self {
            project: Some(id),
            meeting: None,
        }
    }

    pub fn meeting(project_id: Uuid, meeting_id: Uuid) -> Self {
        Self {
            project: Some(project_id),
            meeting: Some(meeting_id),
        }
    }
}

/// where dispatched notifications land, split out so a broken store can be
/// simulated in tests
pub trait NotificationSink: Send + Sync {
    fn append(&self, notification: Notification) -> anyhow::Result<()>;
}

pub struct StoreSink {
    db: Arc<Database>,
}

impl StoreSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl NotificationSink for StoreSink {
    fn append(&self, notification: Notification) -> anyhow::Result<()> {
        self.db.notifications.insert(notification.id, notification);
        Ok(())
    }
}

/// Fans a workflow transition out to the affected users. Delivery is
/// best-effort: a failed append is logged and swallowed so the triggering
/// operation never rolls back over a notification hiccup.
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
        refs: NotificationRefs,
        created_by: Uuid,
    ) {
        let now = self.clock.now();
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient,
            kind,
            title: title.to_owned(),
            message: message.to_owned(),
            project_id: refs.project,
            meeting_id: refs.meeting,
            created_by,
            is_read: false,
            created_at: now,
            expires_at: now + Duration::days(NOTIFICATION_TTL_DAYS),
        };

        if let Err(err) = self.sink.append(notification) {
            warn!("dropping notification for {recipient}: {err:#}");
        }
    }

    /// same message to several recipients, skipping the actor themselves
    pub fn notify_many(
        &self,
        recipients: &[Uuid],
        kind: NotificationType,
        title: &str,
        message: &str,
        refs: NotificationRefs,
        created_by: Uuid,
    ) {
        for &recipient in recipients {
            if recipient == created_by {
                continue;
            }
            self.notify(recipient, kind, title, message, refs, created_by);
        }
    }
}

/// recipient-facing reads and mutations
pub struct NotificationService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// unexpired notifications for the caller, newest first
    pub async fn list_for_user(&self, caller: &Caller) -> Vec<Notification> {
        let now = self.clock.now();
        let mut out = self
            .db
            .notifications
            .find(|n| n.recipient == caller.id && n.expires_at > now);
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub async fn mark_read(&self, caller: &Caller, id: Uuid) -> CoreResult<Notification> {
        let caller_id = caller.id;
        self.db.notifications.mutate(id, |n| {
            if n.recipient != caller_id {
                return Err(CoreError::Forbidden(
                    "only the recipient can mark a notification read".into(),
                ));
            }
            n.is_read = true;
            Ok(n.clone())
        })
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> CoreResult<()> {
        let current = self
            .db
            .notifications
            .get(id)
            .ok_or_else(|| CoreError::NotFound("notification not found".into()))?;
        if current.doc.recipient != caller.id {
            return Err(CoreError::Forbidden(
                "only the recipient can delete a notification".into(),
            ));
        }
        self.db.notifications.remove(id);
        Ok(())
    }
}
