use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new().route("/", get(list_users)).with_state(state)
}

#[derive(Serialize)]
struct ListUsersResponse {
    users: Vec<UserSummary>,
}

async fn list_users(
    State(state): State<UsersState>,
    _admin: Auth<AdminOnly>,
) -> Json<ListUsersResponse> {
    Json(ListUsersResponse {
        users: state.db.users().list().await,
    })
}
