//! Database abstraction layer for newsreport.
//!
//! Provides a trait-based interface for database operations. A [`Connector`]
//! hands out a fresh [`DatabaseClient`] for every statement; the
//! [`QueryRunner`] owns the connect/execute/close sequence.

mod mock;
mod postgres;
mod runner;
mod types;

pub use mock::{MockConnector, MockDatabaseClient};
pub use postgres::{PostgresClient, PostgresConnector};
pub use runner::QueryRunner;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// A client wraps exactly one live connection to the store.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a SQL query and returns the complete result set.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Opens new database clients.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a new connection to the store.
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>>;
}
