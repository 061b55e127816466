//! Mock database client for testing.
//!
//! Returns canned results keyed by SQL text and records how many connections
//! were opened and closed.

use super::{Connector, DatabaseClient, QueryResult};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockStats {
    executed: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// A connector whose clients answer from a fixed table of results.
///
/// Statements without a registered result fail with a query error, which
/// makes the mock usable for both the success and the failure path.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    results: Arc<HashMap<String, QueryResult>>,
    connect_error: Option<String>,
    delay: Option<Duration>,
    stats: Arc<MockStats>,
}

impl MockConnector {
    /// Creates a connector with no registered results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the result returned for `sql`.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        Arc::make_mut(&mut self.results).insert(sql.into(), result);
        self
    }

    /// Makes every statement take at least `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every connection attempt fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            connect_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of clients handed out so far.
    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    /// Number of clients closed so far.
    pub fn closed(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.stats
            .executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        if let Some(message) = &self.connect_error {
            return Err(ReportError::connection(message.clone()));
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient {
            results: Arc::clone(&self.results),
            delay: self.delay,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// A mock database client handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockDatabaseClient {
    results: Arc<HashMap<String, QueryResult>>,
    delay: Option<Duration>,
    stats: Arc<MockStats>,
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut executed) = self.stats.executed.lock() {
            executed.push(sql.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.results
            .get(sql)
            .cloned()
            .ok_or_else(|| ReportError::query(format!("no mock result for: {sql}")))
    }

    async fn close(&self) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
