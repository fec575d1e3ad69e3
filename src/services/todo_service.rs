use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewTodo, Todo, TodoChange, TodoItem, TodoPatch};
use crate::database::repository::TodoRepository;
use crate::pagination::{page_offset, Pagination};
use crate::services::authorize;

/// Typed failures surfaced to the HTTP boundary. Persistence failures of
/// any shape (bad sort column, bad predicate, connectivity) collapse into
/// `Internal`, keeping the cause for logging but opaque to clients.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Todo not found")]
    NotFound,

    #[error("Forbidden access")]
    Forbidden,

    #[error("internal error")]
    Internal(#[from] DatabaseError),
}

/// Flat equality filters for list. The owner id is mandatory: every list
/// query is scoped to the authenticated caller.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_completed: Option<bool>,
}

impl ListFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            title: None,
            description: None,
            is_completed: None,
        }
    }
}

/// Paging, sorting and free-text search options for list.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub page: Option<i32>,
    pub limit: Option<i32>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub search: Option<String>,
}

/// Pagination envelope returned by list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    pub current_page: i32,
    pub total_pages: i64,
    pub next_page: Option<i32>,
    pub count_rows: i64,
    pub count_all: i64,
    pub rows: Vec<TodoItem>,
}

const DEFAULT_PAGE: i32 = 1;

/// Query service for todos, generic over the persistence collaborator.
pub struct TodoService<R> {
    repo: R,
}

impl<R: TodoRepository> TodoService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a todo owned by `user_id` (the authenticated caller).
    /// `is_completed` starts false. Title/description emptiness is the
    /// boundary's concern; it is not re-validated here.
    pub async fn create(&self, user_id: Uuid, data: NewTodo) -> Result<Todo, TodoError> {
        Ok(self.repo.insert(user_id, data).await?)
    }

    /// List todos matching the merged predicate, one page at a time.
    ///
    /// The total count and the page slice are fetched concurrently; both
    /// must complete before the envelope is produced. The two queries do
    /// not share a transaction, so the count may drift from the slice
    /// under concurrent writes.
    pub async fn list(
        &self,
        filter: ListFilter,
        options: ListOptions,
        conditions: Option<Value>,
    ) -> Result<TodoPage, TodoError> {
        let page = options.page.unwrap_or(DEFAULT_PAGE);
        let limit = options
            .limit
            .unwrap_or(crate::config::config().filter.default_limit);

        let where_clause = merge_where(&filter, conditions.as_ref(), options.search.as_deref());
        let order = options.sort_by.as_ref().map(|col| {
            let mut spec = Map::new();
            spec.insert(
                column_name(col),
                json!(options.sort_type.as_deref().unwrap_or("asc")),
            );
            Value::Object(spec)
        });
        let offset = page_offset(page, limit);

        let (count_all, rows) = tokio::try_join!(
            self.repo.count(where_clause.clone()),
            self.repo.find_page(where_clause.clone(), order, limit, offset),
        )?;

        let paging = Pagination::compute(page, count_all, limit)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(TodoPage {
            current_page: page,
            total_pages: paging.total_pages,
            next_page: paging.next_page,
            count_rows: rows.len() as i64,
            count_all,
            rows,
        })
    }

    /// Fetch one todo. Ownership is not checked here; callers gate access
    /// with [`authorize::require_owner`].
    pub async fn get_by_id(&self, id: Uuid) -> Result<Todo, TodoError> {
        self.repo.find_by_id(id).await?.ok_or(TodoError::NotFound)
    }

    /// Partial update, restricted to the owner. `requester_id` is the
    /// authenticated identity; the stored row's owner is the single source
    /// of truth for the check, and the owner column itself is never
    /// touched by the update.
    pub async fn update_by_id(
        &self,
        id: Uuid,
        requester_id: Uuid,
        patch: TodoPatch,
    ) -> Result<TodoChange, TodoError> {
        let todo = self.get_by_id(id).await?;
        authorize::require_owner(todo.user_id, requester_id)?;
        Ok(self.repo.update(id, patch).await?)
    }

    /// Delete, restricted to the owner. Returns the row as it was before
    /// deletion.
    pub async fn delete_by_id(&self, id: Uuid, requester_id: Uuid) -> Result<Todo, TodoError> {
        let todo = self.get_by_id(id).await?;
        authorize::require_owner(todo.user_id, requester_id)?;
        self.repo.delete(id).await?;
        Ok(todo)
    }
}

/// Combine flat equality filters, nested operator conditions, and free-text
/// search into one predicate.
///
/// Parts are ANDed; a non-empty search term adds a case-insensitive
/// substring match over title OR description. An empty search term
/// contributes nothing, so the predicate is identical to one built without
/// search.
pub(crate) fn merge_where(
    filter: &ListFilter,
    conditions: Option<&Value>,
    search: Option<&str>,
) -> Value {
    let mut flat = Map::new();
    flat.insert("user_id".to_string(), json!(filter.user_id));
    if let Some(title) = &filter.title {
        flat.insert("title".to_string(), json!(title));
    }
    if let Some(description) = &filter.description {
        flat.insert("description".to_string(), json!(description));
    }
    if let Some(is_completed) = filter.is_completed {
        flat.insert("is_completed".to_string(), json!(is_completed));
    }

    let mut clauses = vec![Value::Object(flat)];

    if let Some(conditions) = conditions {
        if conditions.as_object().is_some_and(|o| !o.is_empty()) {
            clauses.push(map_condition_columns(conditions));
        }
    }

    if let Some(search) = search {
        if !search.is_empty() {
            let needle = format!("%{}%", search);
            clauses.push(json!({
                "$or": [
                    { "title": { "$ilike": &needle } },
                    { "description": { "$ilike": &needle } },
                ]
            }));
        }
    }

    if clauses.len() == 1 {
        clauses.pop().unwrap()
    } else {
        json!({ "$and": clauses })
    }
}

/// Wire field names are camelCase; columns are snake_case. Unknown names
/// pass through and fail (if at all) at the database.
fn column_name(field: &str) -> String {
    match field {
        "entryDate" => "entry_date",
        "isCompleted" => "is_completed",
        "userId" => "user_id",
        "createdAt" => "created_at",
        "updatedAt" => "updated_at",
        other => other,
    }
    .to_string()
}

/// Rewrite field keys of a nested condition tree to column names. Keys
/// starting with `$` are operators and are kept as-is.
fn map_condition_columns(v: &Value) -> Value {
    match v {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, val) in obj {
                if key.starts_with('$') {
                    out.insert(key.clone(), map_condition_columns(val));
                } else {
                    out.insert(column_name(key), val.clone());
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(map_condition_columns).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;

    /// In-memory repository for service tests. Predicate fidelity is
    /// covered by the filter module's own tests; this mock only honors
    /// paging so the envelope math is meaningful.
    struct MemoryRepository {
        todos: Mutex<Vec<Todo>>,
    }

    impl MemoryRepository {
        fn new(todos: Vec<Todo>) -> Self {
            Self {
                todos: Mutex::new(todos),
            }
        }

        fn snapshot(&self) -> Vec<Todo> {
            self.todos.lock().unwrap().clone()
        }
    }

    fn todo(owner: Uuid, title: &str) -> Todo {
        Todo {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: "desc".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_completed: false,
            user_id: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(todo: &Todo) -> TodoItem {
        TodoItem {
            id: todo.id,
            title: todo.title.clone(),
            description: todo.description.clone(),
            entry_date: todo.entry_date,
            is_completed: todo.is_completed,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }

    #[async_trait]
    impl TodoRepository for MemoryRepository {
        async fn count(&self, _where_clause: Value) -> Result<i64, DatabaseError> {
            Ok(self.todos.lock().unwrap().len() as i64)
        }

        async fn find_page(
            &self,
            _where_clause: Value,
            _order: Option<Value>,
            limit: i32,
            offset: i32,
        ) -> Result<Vec<TodoItem>, DatabaseError> {
            Ok(self
                .todos
                .lock()
                .unwrap()
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(item)
                .collect())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError> {
            Ok(self
                .todos
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == id)
                .cloned())
        }

        async fn insert(&self, user_id: Uuid, data: NewTodo) -> Result<Todo, DatabaseError> {
            let todo = Todo {
                id: Uuid::new_v4(),
                title: data.title,
                description: data.description,
                entry_date: data.entry_date,
                is_completed: false,
                user_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.todos.lock().unwrap().push(todo.clone());
            Ok(todo)
        }

        async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<TodoChange, DatabaseError> {
            let mut todos = self.todos.lock().unwrap();
            let todo = todos
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| DatabaseError::QueryError("row missing".to_string()))?;
            if let Some(title) = patch.title {
                todo.title = title;
            }
            if let Some(description) = patch.description {
                todo.description = description;
            }
            if let Some(entry_date) = patch.entry_date {
                todo.entry_date = entry_date;
            }
            if let Some(is_completed) = patch.is_completed {
                todo.is_completed = is_completed;
            }
            Ok(TodoChange {
                id: todo.id,
                title: todo.title.clone(),
                description: todo.description.clone(),
                user_id: todo.user_id,
            })
        }

        async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
            self.todos.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }
    }

    fn service(todos: Vec<Todo>) -> TodoService<MemoryRepository> {
        TodoService::new(MemoryRepository::new(todos))
    }

    #[tokio::test]
    async fn create_assigns_owner_from_caller() {
        let owner = Uuid::new_v4();
        let svc = service(vec![]);
        let created = svc
            .create(
                owner,
                NewTodo {
                    title: "Buy milk".to_string(),
                    description: "2%".to_string(),
                    entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.user_id, owner);
        assert!(!created.is_completed);

        let fetched = svc.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.user_id, owner);
    }

    #[tokio::test]
    async fn list_envelope_math() {
        let owner = Uuid::new_v4();
        let svc = service(vec![
            todo(owner, "a"),
            todo(owner, "b"),
            todo(owner, "c"),
        ]);
        let page = svc
            .list(
                ListFilter::for_user(owner),
                ListOptions {
                    page: Some(1),
                    limit: Some(10),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.count_all, 3);
        assert_eq!(page.count_rows, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn list_second_page_offsets_past_the_first() {
        let owner = Uuid::new_v4();
        let svc = service((0..5).map(|i| todo(owner, &format!("t{}", i))).collect());
        let page = svc
            .list(
                ListFilter::for_user(owner),
                ListOptions {
                    page: Some(2),
                    limit: Some(2),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.count_all, 5);
        assert_eq!(page.count_rows, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.rows[0].title, "t2");
    }

    #[tokio::test]
    async fn update_by_stranger_is_forbidden_and_changes_nothing() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let existing = todo(owner, "original");
        let id = existing.id;
        let svc = service(vec![existing]);

        let err = svc
            .update_by_id(
                id,
                stranger,
                TodoPatch {
                    title: Some("hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::Forbidden));
        assert_eq!(svc.repo.snapshot()[0].title, "original");
    }

    #[tokio::test]
    async fn update_by_owner_applies_only_given_fields() {
        let owner = Uuid::new_v4();
        let existing = todo(owner, "original");
        let id = existing.id;
        let svc = service(vec![existing]);

        let change = svc
            .update_by_id(
                id,
                owner,
                TodoPatch {
                    title: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(change.title, "renamed");
        assert_eq!(change.description, "desc");
        assert_eq!(change.user_id, owner);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let svc = service(vec![]);
        let err = svc
            .update_by_id(Uuid::new_v4(), Uuid::new_v4(), TodoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::NotFound));
    }

    #[tokio::test]
    async fn delete_returns_prior_state_and_removes_the_row() {
        let owner = Uuid::new_v4();
        let existing = todo(owner, "goner");
        let id = existing.id;
        let svc = service(vec![existing]);

        let deleted = svc.delete_by_id(id, owner).await.unwrap();
        assert_eq!(deleted.title, "goner");
        assert!(svc.repo.snapshot().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let svc = service(vec![todo(Uuid::new_v4(), "keep")]);
        let err = svc
            .delete_by_id(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::NotFound));
        assert_eq!(svc.repo.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn delete_by_stranger_is_forbidden() {
        let owner = Uuid::new_v4();
        let existing = todo(owner, "keep");
        let id = existing.id;
        let svc = service(vec![existing]);

        let err = svc.delete_by_id(id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TodoError::Forbidden));
        assert_eq!(svc.repo.snapshot().len(), 1);
    }

    mod merge {
        use super::*;
        use crate::filter::Filter;

        fn compile(where_clause: Value) -> (String, Vec<Value>) {
            let mut filter = Filter::new("todos").unwrap();
            filter.where_clause(where_clause).unwrap();
            let sql = filter.to_sql().unwrap();
            (sql.query, sql.params)
        }

        #[test]
        fn empty_search_is_identical_to_no_search() {
            let filter = ListFilter::for_user(Uuid::nil());
            let without = merge_where(&filter, None, None);
            let with_empty = merge_where(&filter, None, Some(""));
            assert_eq!(without, with_empty);
            assert_eq!(compile(without), compile(with_empty));
        }

        #[test]
        fn search_adds_or_clause_over_title_and_description() {
            let filter = ListFilter::for_user(Uuid::nil());
            let merged = merge_where(&filter, None, Some("milk"));
            let (sql, params) = compile(merged);
            assert!(sql.contains("\"title\" ILIKE"));
            assert!(sql.contains("OR"));
            assert!(sql.contains("\"description\" ILIKE"));
            assert!(params.contains(&json!("%milk%")));
        }

        #[test]
        fn flat_filters_always_scope_to_the_user() {
            let user = Uuid::new_v4();
            let mut filter = ListFilter::for_user(user);
            filter.is_completed = Some(true);
            let merged = merge_where(&filter, None, None);
            assert_eq!(merged["user_id"], json!(user));
            assert_eq!(merged["is_completed"], json!(true));
        }

        #[test]
        fn nested_conditions_are_anded_with_flat_filters() {
            let filter = ListFilter::for_user(Uuid::nil());
            let conditions = json!({ "entryDate": { "$gte": "2024-01-01" } });
            let merged = merge_where(&filter, Some(&conditions), None);
            let and = merged["$and"].as_array().unwrap();
            assert_eq!(and.len(), 2);
            // camelCase wire name mapped to the column name
            assert!(and[1].get("entry_date").is_some());
        }

        #[test]
        fn all_three_parts_combine() {
            let filter = ListFilter::for_user(Uuid::nil());
            let conditions = json!({ "isCompleted": { "$ne": true } });
            let merged = merge_where(&filter, Some(&conditions), Some("milk"));
            let and = merged["$and"].as_array().unwrap();
            assert_eq!(and.len(), 3);
            let (sql, _) = compile(merged.clone());
            assert!(sql.contains("\"user_id\" = $1"));
            assert!(sql.contains("\"is_completed\" <> $2"));
            assert!(sql.contains("ILIKE"));
        }

        #[test]
        fn empty_conditions_object_contributes_nothing() {
            let filter = ListFilter::for_user(Uuid::nil());
            let merged = merge_where(&filter, Some(&json!({})), None);
            assert!(merged.get("$and").is_none());
        }
    }
}
