//! SQL rendering for cache predicates.
//!
//! Predicates are rendered into a WHERE clause with numbered parameters
//! (`?1`, `?2`, ...). Values are always bound, never inlined, so contact
//! input cannot alter the statement.

use crate::storage::predicate::{Column, Predicate, Value};
use rusqlite::types::Value as SqlValue;

/// Cache table name.
pub const CACHE_TABLE: &str = "contact_cache";

/// Alias used for the cache table in generated statements.
pub const TABLE_ALIAS: &str = "c";

/// Converts a predicate value into a bound `SQLite` value.
///
/// Timestamps are stored as Unix milliseconds.
#[must_use]
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Timestamp(v) => SqlValue::Integer(v.timestamp_millis()),
    }
}

/// Converts the bound of a `>=` comparison.
///
/// Stored timestamps are whole milliseconds, so a bound with a sub-millisecond
/// part is rounded up: `stored >= ceil(bound)` holds exactly when
/// `stored >= bound`.
fn to_sql_lower_bound(value: &Value) -> SqlValue {
    match value {
        Value::Timestamp(v) if v.timestamp_subsec_nanos() % 1_000_000 != 0 => {
            SqlValue::Integer(v.timestamp_millis() + 1)
        },
        other => to_sql_value(other),
    }
}

/// Renders a predicate as a WHERE clause body with numbered parameters.
///
/// # Arguments
///
/// * `predicate` - The predicate to render
/// * `start_param` - The first parameter number to use
///
/// # Returns
///
/// A tuple containing:
/// - The clause (no leading `WHERE`)
/// - The bound values, in parameter order
/// - The next available parameter index
///
/// # Examples
///
/// ```
/// use contact_gate::storage::predicate::{Column, Predicate};
/// use contact_gate::storage::sqlite::render_predicate;
///
/// let predicate = Predicate::Or(vec![
///     Predicate::Equals(Column::Email, "a@b.com".into()),
///     Predicate::In(Column::ExclusivePattern, vec![1_i64.into(), 2_i64.into()]),
/// ]);
/// let (clause, params, next) = render_predicate(&predicate, 1);
/// assert_eq!(clause, "(c.email = ?1 OR c.exclusive_pattern IN (?2,?3))");
/// assert_eq!(params.len(), 3);
/// assert_eq!(next, 4);
/// ```
#[must_use]
pub fn render_predicate(predicate: &Predicate, start_param: usize) -> (String, Vec<SqlValue>, usize) {
    let mut params = Vec::new();
    let mut param_idx = start_param;
    let clause = render_node(predicate, &mut params, &mut param_idx);
    (clause, params, param_idx)
}

fn qualified(column: Column) -> String {
    format!("{TABLE_ALIAS}.{}", column.as_str())
}

fn bind(value: &Value, params: &mut Vec<SqlValue>, param_idx: &mut usize) -> String {
    push_param(to_sql_value(value), params, param_idx)
}

fn push_param(value: SqlValue, params: &mut Vec<SqlValue>, param_idx: &mut usize) -> String {
    let placeholder = format!("?{param_idx}");
    *param_idx += 1;
    params.push(value);
    placeholder
}

fn render_node(predicate: &Predicate, params: &mut Vec<SqlValue>, param_idx: &mut usize) -> String {
    match predicate {
        Predicate::Equals(column, value) => {
            format!("{} = {}", qualified(*column), bind(value, params, param_idx))
        },
        Predicate::In(_, values) if values.is_empty() => "0".to_string(),
        Predicate::In(column, values) => {
            let placeholders: Vec<String> = values
                .iter()
                .map(|value| bind(value, params, param_idx))
                .collect();
            format!("{} IN ({})", qualified(*column), placeholders.join(","))
        },
        Predicate::Gte(column, value) => {
            let bound = push_param(to_sql_lower_bound(value), params, param_idx);
            format!("{} >= {bound}", qualified(*column))
        },
        Predicate::IsNull(column) => format!("{} IS NULL", qualified(*column)),
        Predicate::And(children) => join_children(children, " AND ", "1", params, param_idx),
        Predicate::Or(children) => join_children(children, " OR ", "0", params, param_idx),
    }
}

fn join_children(
    children: &[Predicate],
    separator: &str,
    identity: &str,
    params: &mut Vec<SqlValue>,
    param_idx: &mut usize,
) -> String {
    if children.is_empty() {
        return identity.to_string();
    }
    let parts: Vec<String> = children
        .iter()
        .map(|child| render_node(child, params, param_idx))
        .collect();
    format!("({})", parts.join(separator))
}
