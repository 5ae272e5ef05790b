use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:id/notifications", get(list_notifications))
        .route(
            "/users/:id/notifications/:notification_id/read",
            post(mark_read),
        )
}

#[derive(Serialize)]
pub struct InboxResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<InboxResponse> {
    Json(InboxResponse {
        notifications: state.inbox.list(id),
        unread: state.inbox.unread_count(id),
    })
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path((id, notification_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.inbox.mark_read(id, notification_id)?;
    Ok(Json(notification))
}
