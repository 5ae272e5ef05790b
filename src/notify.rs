use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;

/// Per-recipient notification inbox. The core pushes fire-and-forget;
/// clients read via list/mark-read, whether they poll or sit on the
/// event stream.
pub struct Inbox {
    inboxes: DashMap<Uuid, Vec<Notification>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
        }
    }

    /// Appending never fails; delivery problems are not the caller's
    /// concern and must not surface into the transition that triggered
    /// the notification.
    pub fn push(&self, notification: Notification) {
        self.inboxes
            .entry(notification.recipient_id)
            .or_default()
            .push(notification);
    }

    /// Newest first.
    pub fn list(&self, recipient_id: Uuid) -> Vec<Notification> {
        let mut notifications = self
            .inboxes
            .get(&recipient_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    pub fn mark_read(
        &self,
        recipient_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, AppError> {
        let mut entry = self.inboxes.get_mut(&recipient_id).ok_or_else(|| {
            AppError::NotFound(format!("notification {notification_id} not found"))
        })?;

        let notification = entry
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("notification {notification_id} not found"))
            })?;

        notification.read = true;
        Ok(notification.clone())
    }

    pub fn unread_count(&self, recipient_id: Uuid) -> usize {
        self.inboxes
            .get(&recipient_id)
            .map(|entry| entry.iter().filter(|n| !n.read).count())
            .unwrap_or(0)
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::Inbox;
    use crate::models::notification::{Notification, NotificationKind};

    #[test]
    fn mark_read_flips_the_flag() {
        let inbox = Inbox::new();
        let recipient = Uuid::from_u128(1);

        let notification = Notification::new(
            recipient,
            NotificationKind::TripCancelled,
            None,
            "Trip cancelled by driver",
            Some("flat tire".to_string()),
        );
        let id = notification.id;
        inbox.push(notification);

        assert_eq!(inbox.unread_count(recipient), 1);
        let read = inbox.mark_read(recipient, id).unwrap();
        assert!(read.read);
        assert_eq!(inbox.unread_count(recipient), 0);
    }

    #[test]
    fn unknown_notification_is_not_found() {
        let inbox = Inbox::new();
        let recipient = Uuid::from_u128(2);
        assert!(inbox.mark_read(recipient, Uuid::from_u128(3)).is_err());
    }
}
