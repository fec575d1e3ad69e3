use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

/// Typed query execution over the filter module's compiled SQL.
pub struct QueryBuilder<T> {
    table_name: String,
    filter: Option<Filter>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter's table name validation
        Filter::new(&name).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(Self {
            table_name: name,
            filter: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        let mut filter =
            Filter::new(&self.table_name).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        filter
            .assign(filter_data)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        if crate::config::config().filter.debug_logging {
            tracing::debug!(query = %sql_result.query, "executing select");
        }
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_value_as(q, classify(p));
        }
        let rows = q.fetch_all(pool).await?;
        Ok(rows)
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql_result = if let Some(filter) = self.filter {
            filter
                .to_count_sql()
                .map_err(|e| DatabaseError::QueryError(e.to_string()))?
        } else {
            SqlResult {
                query: format!("SELECT COUNT(*) as count FROM \"{}\"", self.table_name),
                params: vec![],
            }
        };

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_value(q, classify(p));
        }
        let row = q.fetch_one(pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        if let Some(filter) = &self.filter {
            filter
                .to_sql()
                .map_err(|e| DatabaseError::QueryError(e.to_string()))
        } else {
            Ok(SqlResult {
                query: format!("SELECT * FROM \"{}\"", self.table_name),
                params: vec![],
            })
        }
    }
}

/// A JSON parameter resolved to the Postgres type it should bind as.
///
/// Predicate values arrive as JSON, so uuid/date/timestamp columns would
/// otherwise receive TEXT binds and fail type resolution server-side.
/// Strings shaped like those types bind as the richer type.
enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
    Json(Value),
}

fn classify(v: &Value) -> BindValue {
    match v {
        Value::Null => BindValue::Null,
        Value::Bool(b) => BindValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BindValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres has no u64; narrow if it fits
                BindValue::Int(u as i64)
            } else {
                BindValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => {
            if let Ok(u) = Uuid::parse_str(s) {
                BindValue::Uuid(u)
            } else if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                BindValue::Date(d)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                BindValue::Timestamp(ts.with_timezone(&Utc))
            } else {
                BindValue::Text(s.clone())
            }
        }
        Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
    }
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: BindValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        BindValue::Null => q.bind(None::<String>),
        BindValue::Bool(b) => q.bind(b),
        BindValue::Int(i) => q.bind(i),
        BindValue::Float(f) => q.bind(f),
        BindValue::Uuid(u) => q.bind(u),
        BindValue::Date(d) => q.bind(d),
        BindValue::Timestamp(ts) => q.bind(ts),
        BindValue::Text(s) => q.bind(s),
        BindValue::Json(v) => q.bind(v),
    }
}

fn bind_value_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: BindValue,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        BindValue::Null => q.bind(None::<String>),
        BindValue::Bool(b) => q.bind(b),
        BindValue::Int(i) => q.bind(i),
        BindValue::Float(f) => q.bind(f),
        BindValue::Uuid(u) => q.bind(u),
        BindValue::Date(d) => q.bind(d),
        BindValue::Timestamp(ts) => q.bind(ts),
        BindValue::Text(s) => q.bind(s),
        BindValue::Json(v) => q.bind(v),
    }
}
