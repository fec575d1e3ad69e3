// handlers/todos/create.rs - POST /api/todos

use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use super::service;
use crate::database::models::{NewTodo, Todo};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoBody {
    pub title: String,
    pub description: String,
    /// Defaults to today when omitted.
    pub entry_date: Option<NaiveDate>,
}

/// Create a todo owned by the authenticated caller. Any owner id in the
/// body is ignored; ownership comes from the token.
pub async fn todo_create(
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTodoBody>,
) -> ApiResult<Todo> {
    let mut field_errors = HashMap::new();
    if body.title.trim().is_empty() {
        field_errors.insert("title".to_string(), "must not be empty".to_string());
    }
    if body.description.trim().is_empty() {
        field_errors.insert("description".to_string(), "must not be empty".to_string());
    }
    if !field_errors.is_empty() {
        return Err(ApiError::validation_error(
            "Invalid request body",
            Some(field_errors),
        ));
    }

    let entry_date = body.entry_date.unwrap_or_else(|| Utc::now().date_naive());

    let todo = service()
        .await?
        .create(
            user.user_id,
            NewTodo {
                title: body.title,
                description: body.description,
                entry_date,
            },
        )
        .await?;

    Ok(ApiResponse::created(todo))
}
