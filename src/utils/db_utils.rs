use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Executor, MySqlPool};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

/// ===============================
/// Dynamic WHERE clause
/// ===============================
#[derive(Debug, Default)]
pub struct WhereBuilder {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause with a single `?` placeholder.
    pub fn push(&mut self, clause: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.push(value.into());
        self
    }

    /// Adds a clause whose placeholders all take the same value (e.g. a
    /// search across several columns).
    pub fn push_repeated(&mut self, clause: &str, value: impl Into<SqlValue>) -> &mut Self {
        let value = value.into();
        for _ in 0..clause.matches('?').count() {
            self.values.push(value.clone());
        }
        self.clauses.push(clause.to_string());
        self
    }

    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::from(" WHERE 1=1")
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> Vec<SqlValue> {
        self.values.clone()
    }
}

pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    values: Vec<SqlValue>,
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

pub fn bind_query_scalar<'q, O>(
    mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    values: Vec<SqlValue>,
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

/// ===============================
/// Pagination
/// ===============================
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
}

impl PageQuery {
    /// `(page, per_page, offset)`
    pub fn resolve(&self) -> (u64, u64, u64) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (page, per_page, page.saturating_sub(1).saturating_mul(per_page))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    PaginatedAttendance = Paginated<crate::model::attendance::Attendance>,
    PaginatedAttendanceEntry = Paginated<crate::api::attendance::AttendanceEntry>,
    PaginatedLeave = Paginated<crate::model::leave_request::LeaveRequest>,
    PaginatedPermission = Paginated<crate::model::permission_request::PermissionRequest>,
    PaginatedWorkLetter = Paginated<crate::model::work_letter::WorkLetter>,
    PaginatedNotification = Paginated<crate::model::notification::Notification>,
    PaginatedUser = Paginated<crate::model::user::User>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: i64,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed` may be updated; anything else is a client error.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload harus berupa objek JSON"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("Tidak ada data yang diubah"));
    }

    let unknown: Vec<String> = obj
        .keys()
        .filter(|k| !allowed.contains(&k.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(ApiError::Validation(unknown));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for (key, value) in obj {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    values.push(SqlValue::U64(u));
                } else if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => {
                return Err(ApiError::bad_request(format!(
                    "Tipe data tidak didukung untuk kolom {key}"
                )));
            }
        }
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}

/// Count + page fetch for list endpoints sharing one WHERE clause.
pub async fn fetch_page<O>(
    pool: &MySqlPool,
    select_sql: &str,
    count_sql: &str,
    filter: &WhereBuilder,
    order_by: &str,
    page: &PageQuery,
) -> Result<Paginated<O>, sqlx::Error>
where
    O: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> + Send + Unpin + Serialize,
{
    let (page_no, per_page, offset) = page.resolve();

    let count_query = format!("{}{}", count_sql, filter.sql());
    let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_query), filter.values())
        .fetch_one(pool)
        .await?;

    let data_query = format!("{}{} ORDER BY {} LIMIT ? OFFSET ?", select_sql, filter.sql(), order_by);
    let data = bind_query_as(sqlx::query_as::<_, O>(&data_query), filter.values())
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(Paginated {
        data,
        page: page_no,
        per_page,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_builder_joins_clauses() {
        let mut filter = WhereBuilder::new();
        assert_eq!(filter.sql(), " WHERE 1=1");

        filter
            .push("u.department_id = ?", 3u64)
            .push_repeated("(u.nip LIKE ? OR u.full_name LIKE ?)", "%siti%");
        assert_eq!(
            filter.sql(),
            " WHERE u.department_id = ? AND (u.nip LIKE ? OR u.full_name LIKE ?)"
        );
        assert_eq!(
            filter.values(),
            vec![
                SqlValue::U64(3),
                SqlValue::String("%siti%".into()),
                SqlValue::String("%siti%".into())
            ]
        );
    }

    #[test]
    fn page_query_is_clamped() {
        let q = PageQuery {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(q.resolve(), (1, 100, 0));

        let q = PageQuery {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(q.resolve(), (3, 10, 20));

        let q = PageQuery {
            page: Some(u64::MAX),
            per_page: Some(100),
        };
        assert_eq!(q.resolve(), (u64::MAX, 100, u64::MAX));
    }

    #[test]
    fn update_sql_uses_whitelist() {
        let payload = json!({ "full_name": "Budi Santoso", "is_active": false });
        let update =
            build_update_sql("users", &payload, &["full_name", "is_active"], "id", 9).unwrap();

        assert!(update.sql.starts_with("UPDATE users SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.values.len(), 3);
        assert_eq!(update.values.last(), Some(&SqlValue::U64(9)));
    }

    #[test]
    fn update_sql_rejects_unknown_columns() {
        let payload = json!({ "password": "x" });
        let err = build_update_sql("users", &payload, &["full_name"], "id", 1).unwrap_err();
        assert!(matches!(err, ApiError::Validation(fields) if fields == vec!["password"]));
    }

    #[test]
    fn update_sql_rejects_empty_payload() {
        assert!(build_update_sql("users", &json!({}), &["full_name"], "id", 1).is_err());
        assert!(build_update_sql("users", &json!([1]), &["full_name"], "id", 1).is_err());
    }
}
