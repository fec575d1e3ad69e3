// handlers/todos/delete.rs - DELETE /api/todos/:id

use axum::extract::Path;
use axum::Extension;
use serde_json::{json, Value};
use uuid::Uuid;

use super::service;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Delete an owned todo.
pub async fn todo_delete(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    service().await?.delete_by_id(id, user.user_id).await?;
    Ok(ApiResponse::success(json!({
        "id": id,
        "message": "Deleted"
    })))
}
