// handlers/todos/list.rs - GET /api/todos

use axum::extract::Query;
use axum::Extension;
use serde::Deserialize;
use serde_json::Value;

use super::service;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ListFilter, ListOptions, TodoPage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTodosQuery {
    // Flat equality filters
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_completed: Option<bool>,

    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,

    // Paging and sorting
    pub page: Option<i32>,
    pub limit: Option<i32>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,

    /// Nested operator conditions, URL-encoded JSON object.
    /// Example: filters={"entryDate":{"$gte":"2024-01-01"}}
    pub filters: Option<String>,
}

/// List the caller's todos with filtering, search and pagination. Results
/// are always scoped to the authenticated user.
pub async fn todo_list(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListTodosQuery>,
) -> ApiResult<TodoPage> {
    if query.page.is_some_and(|p| p < 1) {
        return Err(ApiError::bad_request("page must be a positive integer"));
    }
    if query.limit.is_some_and(|l| l < 1) {
        return Err(ApiError::bad_request("limit must be a positive integer"));
    }

    let conditions = match &query.filters {
        Some(raw) => {
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|e| ApiError::invalid_json(format!("filters is not valid JSON: {}", e)))?;
            if !parsed.is_object() {
                return Err(ApiError::invalid_json("filters must be a JSON object"));
            }
            Some(parsed)
        }
        None => None,
    };

    let filter = ListFilter {
        user_id: user.user_id,
        title: query.title,
        description: query.description,
        is_completed: query.is_completed,
    };
    let options = ListOptions {
        page: query.page,
        limit: query.limit,
        sort_by: query.sort_by,
        sort_type: query.sort_type,
        search: query.search,
    };

    let page = service().await?.list(filter, options, conditions).await?;
    Ok(ApiResponse::success(page))
}
