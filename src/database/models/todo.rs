use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Full todo row. Returned by create, fetch-by-id and delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub entry_date: NaiveDate,
    pub is_completed: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List-view projection: everything except the owner column.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub entry_date: NaiveDate,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TodoItem {
    pub const COLUMNS: [&'static str; 7] = [
        "id",
        "title",
        "description",
        "entry_date",
        "is_completed",
        "created_at",
        "updated_at",
    ];
}

/// Update-result projection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TodoChange {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
}

/// Fields for a new todo. The owner comes from the authenticated caller,
/// never from here.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub entry_date: NaiveDate,
}

/// Partial update. Absent fields keep their stored value; the owner column
/// is not part of this shape, so a body-supplied owner is dropped during
/// deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.entry_date.is_none()
            && self.is_completed.is_none()
    }
}
