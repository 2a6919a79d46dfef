//! User listing and profile endpoints

use axum::extract::State;

use crate::auth::Claims;
use crate::error::Result;
use crate::models::UserView;
use crate::query::QueryParams;
use crate::responses::Envelope;
use crate::services::users::{current_user, list_users};
use crate::state::AppState;

/// `GET /api/users` with search, filter, sort, pagination and `ids`
pub async fn list(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Envelope<Vec<UserView>>> {
    let users = list_users(&state, &params).await?;
    Ok(Envelope::ok("Users retrieved successfully!", users))
}

pub async fn profile(State(state): State<AppState>, claims: Claims) -> Result<Envelope<UserView>> {
    let user = current_user(&state, Some(&claims.email)).await?;
    Ok(Envelope::ok("User profile retrieved successfully!", user))
}
