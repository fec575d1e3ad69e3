use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOp, FilterWhereInfo};

/// Compiles a JSON predicate object into a parameterized SQL WHERE clause.
///
/// Top-level keys are ANDed together. Keys starting with `$` are logical
/// operators over sub-predicates; everything else is a field condition.
pub struct FilterWhere {
    param_values: Vec<Value>,
    // First parameter number this compiler may hand out, minus one.
    // Nested $and/$or compilers start where the parent left off.
    base: usize,
    param_index: usize,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            base: starting_param_index,
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    /// Generate `(where_sql, params)` for a predicate. The clause is empty
    /// when the predicate has no conditions.
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() {
            return Ok(());
        }
        match where_data {
            Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause(
                "WHERE must be a JSON object".to_string(),
            )),
        }
    }

    fn build(&mut self, where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        self.conditions.clear();
        self.param_values.clear();

        self.parse_where_data(where_data)?;

        let mut sql_conditions = vec![];
        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        Ok((sql_conditions.join(" AND "), self.param_values.clone()))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause(
                "Unsupported WHERE format".to_string(),
            )),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let (sql, params) = Self::generate(v, self.param_index)?;
                    if sql.is_empty() {
                        continue;
                    }
                    self.param_values.extend(params);
                    self.param_index = self.base + self.param_values.len();
                    sql_parts.push(format!("({})", sql));
                }
                if sql_parts.is_empty() {
                    return Ok(());
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                self.push_fragment(sql_parts.join(joiner));
                Ok(())
            }
            "$not" => {
                let (sql, params) = Self::generate(value, self.param_index)?;
                if sql.is_empty() {
                    return Ok(());
                }
                self.param_values.extend(params);
                self.param_index = self.base + self.param_values.len();
                self.push_fragment(format!("NOT ({})", sql));
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn push_fragment(&mut self, sql: String) {
        self.conditions.push(FilterWhereInfo {
            column: sql,
            operator: FilterOp::Fragment,
            data: Value::Null,
        });
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                self.conditions.push(FilterWhereInfo {
                    column: field.to_string(),
                    operator,
                    data: op_val.clone(),
                });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            });
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        // Fragments already carry rendered SQL from the logical operators
        if matches!(condition.operator, FilterOp::Fragment) {
            return Ok(condition.column.clone());
        }

        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NULL", quoted_column))
                } else {
                    Ok(format!(
                        "{} = {}",
                        quoted_column,
                        self.param(condition.data.clone())
                    ))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NOT NULL", quoted_column))
                } else {
                    Ok(format!(
                        "{} <> {}",
                        quoted_column,
                        self.param(condition.data.clone())
                    ))
                }
            }
            FilterOp::Gt => Ok(format!(
                "{} > {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::Gte => Ok(format!(
                "{} >= {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::Lt => Ok(format!(
                "{} < {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::Lte => Ok(format!(
                "{} <= {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::Like => Ok(format!(
                "{} LIKE {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::ILike => Ok(format!(
                "{} ILIKE {}",
                quoted_column,
                self.param(condition.data.clone())
            )),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() {
                        // IN over an empty set matches nothing
                        return Ok("1=0".to_string());
                    }
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
                } else {
                    Ok(format!(
                        "{} = {}",
                        quoted_column,
                        self.param(condition.data.clone())
                    ))
                }
            }
            FilterOp::Between => {
                if let Value::Array(values) = &condition.data {
                    if values.len() != 2 {
                        return Err(FilterError::InvalidOperatorData(
                            "$between requires exactly 2 values".to_string(),
                        ));
                    }
                    Ok(format!(
                        "{} BETWEEN {} AND {}",
                        quoted_column,
                        self.param(values[0].clone()),
                        self.param(values[1].clone())
                    ))
                } else {
                    Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            }
            FilterOp::Fragment => unreachable!("fragments handled above"),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gen(v: Value) -> (String, Vec<Value>) {
        FilterWhere::generate(&v, 0).expect("predicate should compile")
    }

    #[test]
    fn implicit_equality() {
        let (sql, params) = gen(json!({ "title": "Buy milk" }));
        assert_eq!(sql, "\"title\" = $1");
        assert_eq!(params, vec![json!("Buy milk")]);
    }

    #[test]
    fn multiple_fields_are_anded() {
        let (sql, params) = gen(json!({ "is_completed": false, "title": "a" }));
        assert_eq!(sql, "\"is_completed\" = $1 AND \"title\" = $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn operator_object() {
        let (sql, params) = gen(json!({ "entry_date": { "$gte": "2024-01-01" } }));
        assert_eq!(sql, "\"entry_date\" >= $1");
        assert_eq!(params, vec![json!("2024-01-01")]);
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let (sql, params) = gen(json!({ "description": null }));
        assert_eq!(sql, "\"description\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn or_of_two_ilike_clauses() {
        let (sql, params) = gen(json!({
            "$or": [
                { "title": { "$ilike": "%milk%" } },
                { "description": { "$ilike": "%milk%" } },
            ]
        }));
        assert_eq!(sql, "(\"title\" ILIKE $1) OR (\"description\" ILIKE $2)");
        assert_eq!(params, vec![json!("%milk%"), json!("%milk%")]);
    }

    #[test]
    fn and_combined_with_or_numbers_params_sequentially() {
        let (sql, params) = gen(json!({
            "$and": [
                { "user_id": "u1" },
                { "$or": [ { "title": { "$ilike": "%a%" } }, { "description": { "$ilike": "%a%" } } ] },
            ]
        }));
        assert_eq!(
            sql,
            "(\"user_id\" = $1) AND ((\"title\" ILIKE $2) OR (\"description\" ILIKE $3))"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn not_wraps_subclause() {
        let (sql, _) = gen(json!({ "$not": { "is_completed": true } }));
        assert_eq!(sql, "NOT (\"is_completed\" = $1)");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = gen(json!({ "id": { "$in": [] } }));
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn between_requires_two_values() {
        let err = FilterWhere::generate(&json!({ "entry_date": { "$between": ["a"] } }), 0)
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidOperatorData(_)));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = FilterWhere::generate(&json!({ "title": { "$regex": ".*" } }), 0).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator(_)));
    }

    #[test]
    fn hostile_column_name_is_rejected() {
        let err = FilterWhere::generate(&json!({ "title\"; DROP TABLE todos; --": 1 }), 0)
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn empty_object_compiles_to_empty_clause() {
        let (sql, params) = gen(json!({}));
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }
}
