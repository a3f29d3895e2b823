use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::auth::Auth;
use crate::client::Notification;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct NotificationsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(NotificationsState);

pub fn router(state: NotificationsState) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .with_state(state)
}

#[derive(Serialize)]
struct NotificationsResponse {
    notifications: Vec<Notification>,
}

async fn list_notifications(_auth: Auth) -> Json<NotificationsResponse> {
    Json(NotificationsResponse {
        notifications: sample_notifications(OffsetDateTime::now_utc()),
    })
}

/// Fixed feed until notifications are persisted per user.
fn sample_notifications(now: OffsetDateTime) -> Vec<Notification> {
    let at = |ago: Duration| (now - ago).format(&Rfc3339).unwrap_or_default();
    vec![
        Notification {
            id: "1".into(),
            title: "Project \"FitPortal\" needs attention".into(),
            message: "Project \"FitPortal\" needs attention".into(),
            timestamp: at(Duration::hours(2)),
            read: false,
        },
        Notification {
            id: "2".into(),
            title: "A new PostgreSQL version is available".into(),
            message: "A new PostgreSQL version is available".into(),
            timestamp: at(Duration::days(1)),
            read: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_timestamps_are_in_the_past() {
        let now = OffsetDateTime::now_utc();
        let items = sample_notifications(now);

        assert_eq!(items.len(), 2);
        for item in items {
            let ts = OffsetDateTime::parse(&item.timestamp, &Rfc3339).unwrap();
            assert!(ts < now);
            assert!(!item.read);
        }
    }
}
