pub mod retry;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{sql_preview, ComparerError, ComparerResult};
use crate::tabular::{ParameterSet, TabularResult};

pub use retry::RetryPolicy;
pub use sqlite::SqliteBackend;

/// A database engine able to run one query attempt.
///
/// Backends do not retry; [`QueryExecutor`] owns the retry policy.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, sql: &str, params: Option<&ParameterSet>) -> Result<TabularResult>;
}

#[derive(Debug, Clone)]
pub struct TimedResult {
    pub data: TabularResult,
    pub elapsed: Duration,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    policy: RetryPolicy,
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn execute(
        &self,
        sql: &str,
        params: Option<&ParameterSet>,
    ) -> ComparerResult<TimedResult> {
        self.execute_with(sql, params, &self.policy).await
    }

    /// Runs `sql` until it succeeds or `policy` is exhausted. The last backend
    /// error is carried by [`ComparerError::QueryExecution`].
    pub async fn execute_with(
        &self,
        sql: &str,
        params: Option<&ParameterSet>,
        policy: &RetryPolicy,
    ) -> ComparerResult<TimedResult> {
        let max_attempts = policy.effective_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            match self.backend.fetch(sql, params).await {
                Ok(data) => {
                    let elapsed = started.elapsed();
                    debug!(
                        backend = self.backend.name(),
                        attempt,
                        rows = data.row_count(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "query returned"
                    );
                    return Ok(TimedResult {
                        data,
                        elapsed,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    if !policy.should_retry(attempt) {
                        return Err(ComparerError::QueryExecution {
                            sql: sql_preview(sql),
                            attempts: attempt,
                            source: err,
                        });
                    }
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        max_attempts,
                        "query attempt failed, retrying: {err:#}"
                    );
                    if !policy.backoff.is_zero() {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
            }
        }
    }
}
