//! Seeded SQLite stand-in for the news database.
//!
//! Each connection opens the same database file, mirroring the one
//! connection per statement behaviour of the production connector.

use async_trait::async_trait;
use newsreport::db::{ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use newsreport::error::{ReportError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE articles (slug TEXT PRIMARY KEY, title TEXT NOT NULL, \
     author INTEGER NOT NULL REFERENCES authors (id))",
    "CREATE TABLE log (time TEXT NOT NULL, url TEXT NOT NULL, status TEXT NOT NULL)",
    "CREATE VIEW article_log AS \
     SELECT log.time, log.url, log.status FROM log \
     JOIN articles ON articles.slug = log.url",
];

/// Builder for a news database with chosen contents.
#[derive(Debug, Default)]
pub struct NewsFixture {
    authors: Vec<(i64, String)>,
    articles: Vec<(String, String, i64)>,
    log: Vec<(String, String, String)>,
}

impl NewsFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, id: i64, name: &str) -> Self {
        self.authors.push((id, name.to_string()));
        self
    }

    pub fn article(mut self, slug: &str, title: &str, author: i64) -> Self {
        self.articles
            .push((slug.to_string(), title.to_string(), author));
        self
    }

    /// Adds `count` log entries for `url` at `time` with `status`.
    pub fn hits(mut self, count: usize, time: &str, url: &str, status: &str) -> Self {
        for _ in 0..count {
            self.log
                .push((time.to_string(), url.to_string(), status.to_string()));
        }
        self
    }

    /// Writes the database file and returns a connector for it.
    ///
    /// The returned directory must be kept alive for as long as the
    /// connector is used.
    pub async fn build(self) -> (SqliteConnector, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");

        let pool = open_pool(&path).await;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        for (id, name) in &self.authors {
            sqlx::query("INSERT INTO authors (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (slug, title, author) in &self.articles {
            sqlx::query("INSERT INTO articles (slug, title, author) VALUES (?, ?, ?)")
                .bind(slug)
                .bind(title)
                .bind(author)
                .execute(&pool)
                .await
                .unwrap();
        }
        for (time, url, status) in &self.log {
            sqlx::query("INSERT INTO log (time, url, status) VALUES (?, ?, ?)")
                .bind(time)
                .bind(url)
                .bind(status)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;

        (SqliteConnector::new(&path), dir)
    }
}

/// Creates a database file without the news schema.
pub async fn empty_database() -> (SqliteConnector, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    open_pool(&path).await.close().await;
    (SqliteConnector::new(&path), dir)
}

async fn open_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}

/// Opens a fresh single-connection SQLite client per statement.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", self.path.display()))
            .map_err(|e| ReportError::connection(e.to_string()))?
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ReportError::connection(e.to_string()))?;

        Ok(Box::new(SqliteClient { pool }))
    }
}

struct SqliteClient {
    pool: SqlitePool,
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReportError::query(e.to_string()))?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(QueryResult::with_data(columns, rows.iter().map(convert_row).collect())
            .with_execution_time(start.elapsed()))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts by the runtime storage class; SQLite has no date type, so days
/// arrive as `YYYY-MM-DD` text.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len())
        .map(|i| {
            let storage_class = match row.try_get_raw(i) {
                Ok(raw) if !raw.is_null() => raw.type_info().name().to_string(),
                _ => return Value::Null,
            };
            match storage_class.as_str() {
                "INTEGER" => row.try_get::<i64, _>(i).map(Value::Int),
                "REAL" => row.try_get::<f64, _>(i).map(Value::Float),
                _ => row.try_get::<String, _>(i).map(Value::String),
            }
            .unwrap_or(Value::Null)
        })
        .collect()
}
