use std::time::Instant;

use async_trait::async_trait;
use bigdecimal::ToPrimitive;
use serde_json::{Value, json};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{error, info, warn};

use crate::core::error::PipelineError;

/// Structured result of a read query. Rows are dynamic JSON values so the
/// interpreter can tell numeric aggregates apart from text without knowing
/// the statement shape in advance.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read access to the backing store. One Postgres implementation; tests
/// inject an in-memory fake so the pipeline runs without a database.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Run a validated statement. No retries: a validated query that fails
    /// is a generation/validation miss to surface, not a transient to hide.
    async fn execute(&self, sql: &str) -> Result<QueryResult, PipelineError>;

    /// Connectivity check for diagnostics.
    async fn ping(&self) -> Result<(), PipelineError>;
}

/// Upper bound for a single analytical statement. The LIMIT cap bounds the
/// result size; this bounds execution time.
const STATEMENT_TIMEOUT_MS: u32 = 15_000;
const MAX_CONNECTIONS: u32 = 5;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, PipelineError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| PipelineError::Configuration(format!("database connection: {}", e)))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryStore for PgStore {
    async fn execute(&self, sql: &str) -> Result<QueryResult, PipelineError> {
        let started = Instant::now();

        // Scoped acquisition: the connection goes back to the pool when
        // `conn` drops, on every exit path.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| PipelineError::Execution(e.to_string()))?;

        sqlx::query(&format!("SET statement_timeout = {}", STATEMENT_TIMEOUT_MS))
            .execute(&mut *conn)
            .await
            .map_err(|e| PipelineError::Execution(e.to_string()))?;

        let rows: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!(sql, error = %e, "query execution failed");
                PipelineError::Execution(e.to_string())
            })?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let decoded: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
            .collect();

        info!(
            sql,
            rows = decoded.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "query executed"
        );

        Ok(QueryResult {
            columns,
            rows: decoded,
        })
    }

    async fn ping(&self) -> Result<(), PipelineError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Execution(e.to_string()))
    }
}

/// Decode one column of a dynamically-typed row into JSON. Postgres type
/// names come from `TypeInfo::name()`; anything unrecognized falls back to
/// a string decode, then to null.
fn decode_value(row: &PgRow, idx: usize) -> Value {
    if let Ok(raw) = row.try_get_raw(idx) {
        if raw.is_null() {
            return Value::Null;
        }
    }

    let type_name = row.columns()[idx].type_info().name().to_string();
    match type_name.as_str() {
        "INT2" => row.try_get::<i16, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "INT4" => row.try_get::<i32, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "INT8" => row.try_get::<i64, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "NUMERIC" => row
            .try_get::<BigDecimal, _>(idx)
            .ok()
            .and_then(|v| v.to_f64())
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        "BOOL" => row.try_get::<bool, _>(idx).map(|v| json!(v)).unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|v| json!(v.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| json!(v.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| json!(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx).unwrap_or(Value::Null),
        _ => match row.try_get::<String, _>(idx) {
            Ok(v) => Value::String(v),
            Err(_) => {
                warn!(column = idx, pg_type = %type_name, "undecodable column type, emitting null");
                Value::Null
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_reports_empty() {
        let r = QueryResult::default();
        assert!(r.is_empty());
        assert!(r.columns.is_empty());
    }

    #[test]
    fn populated_result_is_not_empty() {
        let r = QueryResult {
            columns: vec!["total".to_string()],
            rows: vec![vec![json!(42)]],
        };
        assert!(!r.is_empty());
    }
}
