// handlers/todos/show.rs - GET /api/todos/:id

use axum::extract::Path;
use axum::Extension;
use uuid::Uuid;

use super::service;
use crate::database::models::Todo;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::authorize;

/// Fetch a single todo. The ownership gate runs after the fetch, so a
/// stranger gets 403 for an existing row and 404 for a missing one.
pub async fn todo_show(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Todo> {
    let todo = service().await?.get_by_id(id).await?;
    authorize::require_owner(todo.user_id, user.user_id)?;
    Ok(ApiResponse::success(todo))
}
