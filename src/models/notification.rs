use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    TripCancelled,
    TripMatched,
    TripConfirmed,
}

/// One inbox entry. Mutated only by a read acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub trip_id: Option<Uuid>,
    pub message: String,
    pub reason: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        kind: NotificationKind,
        trip_id: Option<Uuid>,
        message: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind,
            trip_id,
            message: message.into(),
            reason,
            read: false,
            created_at: Utc::now(),
        }
    }
}
