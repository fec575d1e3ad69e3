use serde::{Deserialize, Serialize};

/// Comparison operators accepted inside a field condition object.
///
/// A condition like `{"entry_date": {"$gte": "2024-01-01"}}` maps the
/// `$gte` key to [`FilterOp::Gte`]. Scalars without an operator object are
/// implicit `$eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$like")]
    Like,
    #[serde(rename = "$ilike")]
    ILike,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$between")]
    Between,

    /// Pseudo-operator carrying a pre-rendered SQL fragment produced by the
    /// logical operators ($and/$or/$not). Never parsed from client input.
    Fragment,
}

/// Everything a query can specify, in one assignable bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    pub where_clause: Option<serde_json::Value>,
    pub order: Option<serde_json::Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// One parsed field condition awaiting SQL generation.
#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// A rendered query plus its positional parameters, ready for binding.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}

/// Column identifiers come from client input, so they are whitelisted to
/// the characters Postgres identifiers use before being double-quoted.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    match name.chars().next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
