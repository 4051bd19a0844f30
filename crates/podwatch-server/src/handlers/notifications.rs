//! Notification feed.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::dto::{LimitQuery, NotificationDto, NotificationsResponse};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

/// Recent node lifecycle notifications, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent notifications", body = NotificationsResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let notifications = state
        .repo
        .recent_notifications(query.resolve(DEFAULT_NOTIFICATION_LIMIT))
        .await?;

    Ok(Json(NotificationsResponse {
        count: notifications.len(),
        notifications: notifications
            .into_iter()
            .map(NotificationDto::from)
            .collect(),
    }))
}
