//! One-shot query execution.

use super::{Connector, QueryResult};
use crate::error::{ReportError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Statement timeout used unless [`QueryRunner::with_timeout`] sets another.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs single statements, each on its own short-lived connection.
///
/// No connection outlives a call to [`QueryRunner::run`]; nothing is pooled or
/// shared between statements.
pub struct QueryRunner {
    connector: Box<dyn Connector>,
    query_timeout: Duration,
}

impl QueryRunner {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the maximum time a single statement may run.
    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Connects, executes `sql`, and closes the connection.
    ///
    /// The connection is closed whether execution succeeded, failed or timed
    /// out. A timed-out statement is a query error. Rows are returned in the
    /// order the statement produced them.
    pub async fn run(&self, sql: &str) -> Result<QueryResult> {
        let client = self.connector.connect().await?;

        let executed = tokio::time::timeout(self.query_timeout, client.execute_query(sql))
            .await
            .unwrap_or_else(|_| {
                Err(ReportError::query(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs_f64()
                )))
            });
        let closed = client.close().await;

        let result = match (executed, closed) {
            (Ok(result), Ok(())) => result,
            (Ok(_), Err(close_err)) => return Err(close_err),
            (Err(query_err), Ok(())) => return Err(query_err),
            (Err(query_err), Err(close_err)) => {
                warn!("Failed to close connection after query error: {close_err}");
                return Err(query_err);
            }
        };

        debug!(
            "Query returned {} rows in {:?}",
            result.row_count(),
            result.execution_time
        );
        Ok(result)
    }
}
