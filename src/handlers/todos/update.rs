// handlers/todos/update.rs - PATCH /api/todos/:id

use axum::extract::Path;
use axum::{Extension, Json};
use uuid::Uuid;

use super::service;
use crate::database::models::{TodoChange, TodoPatch};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Partial update of an owned todo. The patch shape has no owner field, so
/// a body-supplied owner is dropped before it can reach the service; the
/// ownership check compares the stored row against the token identity.
pub async fn todo_update(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TodoPatch>,
) -> ApiResult<TodoChange> {
    if patch.is_empty() {
        return Err(ApiError::validation_error(
            "At least one field must be provided",
            None,
        ));
    }

    let change = service()
        .await?
        .update_by_id(id, user.user_id, patch)
        .await?;
    Ok(ApiResponse::success(change))
}
