use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"created_at desc"`, `["created_at desc", "title"]`, or
    /// `{ "created_at": "desc", "title": "asc" }`.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    if let Value::String(s) = v {
                        out.extend(Self::parse_order_string(s)?);
                    }
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                        "desc" => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    out.push(FilterOrderInfo {
                        column: k.clone(),
                        sort,
                    });
                }
                out
            }
            _ => vec![],
        };

        // Sort columns are client input and end up quoted in ORDER BY
        for info in &infos {
            if !is_valid_identifier(&info.column) {
                return Err(FilterError::InvalidColumn(info.column.clone()));
            }
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                };
                out.push(FilterOrderInfo {
                    column: col.to_string(),
                    sort,
                });
            }
        }
        Ok(out)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
