//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx, and the `PostgresConnector` that opens
//! one such client per statement.

use crate::config::{ConnectionConfig, ReportSettings};
use crate::db::{ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Postgres, Row as SqlxRow, TypeInfo};
use std::time::Instant;
use tracing::debug;

/// PostgreSQL database client holding a single connection.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Connects to the database described by `config`.
    ///
    /// The pool is capped at one connection and connects eagerly, so an
    /// unreachable server or bad credentials fail here and not on first use.
    /// Connection failures are not retried.
    pub async fn connect(config: &ConnectionConfig, settings: &ReportSettings) -> Result<Self> {
        debug!("Connecting to {}", config.display_string());

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(settings.connect_timeout())
            .connect_with(connect_options(config))
            .await
            .map_err(|e| map_connection_error(e, config))?;

        debug!("Successfully connected to database");
        Ok(Self { pool })
    }
}

/// Builds driver options field by field. Credentials are passed verbatim.
fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(config.host_name())
        .port(config.port())
        .database(config.database_name());

    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    options
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReportError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows = result.iter().map(convert_row).collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Opens a new `PostgresClient` for every statement.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    config: ConnectionConfig,
    settings: ReportSettings,
}

impl PostgresConnector {
    pub fn new(config: ConnectionConfig, settings: ReportSettings) -> Self {
        Self { config, settings }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(&self.config, &self.settings).await?;
        Ok(Box::new(client))
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.name(), col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, column: &str, type_name: &str) -> Result<Value> {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index, column)?.map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index, column)?.map(|v| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => {
            decode::<i32>(row, index, column)?.map(|v| Value::Int(v.into()))
        }
        "INT8" | "BIGINT" => decode::<i64>(row, index, column)?.map(Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index, column)?.map(|v| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index, column)?.map(Value::Float),
        "DATE" => decode::<NaiveDate>(row, index, column)?.map(Value::Date),
        _ => decode::<String>(row, index, column)?.map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn decode<'r, T>(row: &'r PgRow, index: usize, column: &str) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| decode_error(column, e))
}

fn decode_error(column: &str, error: sqlx::Error) -> ReportError {
    ReportError::query(format!("Failed to decode column '{column}': {error}"))
}

/// Maps sqlx connection errors to user-friendly messages.
///
/// The server's own message is kept after the summary so the diagnostic
/// the store supplied always reaches the console.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> ReportError {
    let host = config.host_name();
    let port = config.port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database_name();

    let detail = error.to_string();
    let error_str = detail.to_lowercase();

    let summary = if error_str.contains("connection refused") || error_str.contains("could not connect")
    {
        format!("Unable to connect to {host}:{port}. Check that the server is running.")
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        format!("Authentication failed for user '{user}'. Check your credentials.")
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        format!("Unable to connect to {database} database: database does not exist.")
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        "Server requires SSL. Add '?sslmode=require' to connection string.".to_string()
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        )
    } else {
        return ReportError::connection(format!(
            "Unable to connect to {database} database: {detail}"
        ));
    };

    ReportError::connection(format!("{summary}\n  {detail}"))
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }

        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
