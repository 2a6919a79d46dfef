//! User lookups and listing

use crate::error::{ApiError, Result};
use crate::models::{User, UserField, UserView};
use crate::query::{Query, QueryBuilder, QueryParams};
use crate::repository::UserRepository;
use crate::state::AppState;

/// Fields matched by `search`
pub const SEARCH_FIELDS: &[UserField] = &[
    UserField::FirstName,
    UserField::LastName,
    UserField::Email,
    UserField::UserName,
];

/// Load an existing, active user by email
pub async fn validate_user(users: &dyn UserRepository, email: Option<&str>) -> Result<User> {
    let email = email
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("Authentication Error", "Please provide a valid email!", "user")
        })?;

    let user = users.find_by_email(email).await?.ok_or_else(|| {
        ApiError::not_found(format!("No user found with email: {}!", email), "user")
    })?;

    if !user.is_active {
        return Err(ApiError::forbidden(
            "Authentication Error",
            format!("User with email {} is not active!", email),
            "user",
        )
        .into());
    }

    Ok(user)
}

/// Users matching the request's query parameters, passwords excluded
pub async fn list_users(state: &AppState, params: &QueryParams) -> Result<Vec<UserView>> {
    let query = QueryBuilder::new(Query::<User>::new(), params)
        .search(SEARCH_FIELDS)
        .filter()
        .documents_by_ids()
        .sort()
        .paginate()
        .exclude_fields(&[UserField::Password])
        .into_query()
        .compile()?;

    let records = state.users().find(&query).await?;
    tracing::debug!(count = records.len(), "Users listed");
    Ok(records.into_iter().map(UserView::from).collect())
}

/// Profile of the authenticated user
pub async fn current_user(state: &AppState, email: Option<&str>) -> Result<UserView> {
    let user = validate_user(state.users(), email).await?;
    Ok(UserView::from(&user))
}
