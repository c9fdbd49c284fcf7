use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comparison::report::ComparisonReport;
use crate::comparison::row::{RowComparator, ValueEquality};
use crate::error::{ComparerError, ComparerResult};
use crate::executor::QueryExecutor;
use crate::tabular::ParameterSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompareOptions {
    #[serde(default)]
    pub equality: ValueEquality,
    #[serde(default)]
    pub concurrent_pair: bool,
}

#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    executor: QueryExecutor,
    comparator: RowComparator,
    concurrent_pair: bool,
}

impl ComparisonEngine {
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            comparator: RowComparator::default(),
            concurrent_pair: false,
        }
    }

    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.comparator = RowComparator::new(options.equality);
        self.concurrent_pair = options.concurrent_pair;
        self
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub async fn compare(
        &self,
        master_sql: &str,
        branch_sql: &str,
        params: Option<&ParameterSet>,
    ) -> ComparerResult<ComparisonReport> {
        require_sql(master_sql, "master")?;
        require_sql(branch_sql, "branch")?;

        let (master, branch) = if self.concurrent_pair {
            let (master, branch) = tokio::join!(
                self.executor.execute(master_sql, params),
                self.executor.execute(branch_sql, params),
            );
            (master?, branch?)
        } else {
            let master = self.executor.execute(master_sql, params).await?;
            let branch = self.executor.execute(branch_sql, params).await?;
            (master, branch)
        };

        let report = ComparisonReport::analyse(params.cloned(), master, branch, &self.comparator);
        debug!(
            id = %report.id(),
            exact_match = report.exact_match(),
            master_rows = report.master().row_count(),
            branch_rows = report.branch().row_count(),
            "comparison analysed"
        );
        Ok(report)
    }
}

pub(crate) fn require_sql(sql: &str, label: &str) -> ComparerResult<()> {
    if sql.trim().is_empty() {
        return Err(ComparerError::invalid_argument(format!(
            "Please specify {label} Sql"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::comparison::engine::{CompareOptions, ComparisonEngine};
    use crate::comparison::row::ValueEquality;
    use crate::error::ComparerError;
    use crate::executor::testing::{int_rows, table, ScriptedBackend};
    use crate::executor::{QueryExecutor, RetryPolicy};
    use crate::tabular::{ParameterSet, ScalarValue};

    fn engine(backend: Arc<ScriptedBackend>) -> ComparisonEngine {
        ComparisonEngine::new(QueryExecutor::new(backend))
    }

    #[tokio::test]
    async fn matching_queries_produce_exact_match() {
        let rows = table(&["id", "name"], vec![vec![ScalarValue::Integer(1), "a".into()]]);
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("master", rows.clone())
                .respond("branch", rows),
        );
        let report = engine(backend.clone())
            .compare("master", "branch", None)
            .await
            .expect("comparison runs");
        assert!(report.exact_match());
        assert_eq!(
            backend
                .calls()
                .into_iter()
                .map(|(sql, _)| sql)
                .collect::<Vec<_>>(),
            vec!["master".to_string(), "branch".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_sql_is_rejected_before_execution() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend.clone());

        let err = engine.compare("", "branch", None).await.expect_err("empty master");
        assert!(err.is_invalid_argument());
        assert_eq!(err.to_string(), "Please specify master Sql");

        let err = engine
            .compare("master", "  \n", None)
            .await
            .expect_err("blank branch");
        assert_eq!(err.to_string(), "Please specify branch Sql");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn parameters_reach_both_queries() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("master", int_rows("id", &[1]))
                .respond("branch", int_rows("id", &[1])),
        );
        let params = ParameterSet::new().with("id", 1i64);
        let report = engine(backend.clone())
            .compare("master", "branch", Some(&params))
            .await
            .expect("comparison runs");
        assert_eq!(report.parameters(), Some(&params));
        assert!(backend
            .calls()
            .iter()
            .all(|(_, p)| p.as_ref() == Some(&params)));
    }

    #[tokio::test]
    async fn branch_failure_yields_no_report() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("master", int_rows("id", &[1]))
                .fail_always("branch"),
        );
        let engine = ComparisonEngine::new(
            QueryExecutor::new(backend.clone()).with_policy(RetryPolicy::new(2)),
        );
        let err = engine
            .compare("master", "branch", None)
            .await
            .expect_err("branch keeps failing");
        assert!(matches!(
            err,
            ComparerError::QueryExecution { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_pair_keeps_report_semantics() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("master", int_rows("id", &[1, 2]))
                .respond("branch", int_rows("id", &[1])),
        );
        let report = engine(backend)
            .with_options(CompareOptions {
                equality: ValueEquality::textual(),
                concurrent_pair: true,
            })
            .compare("master", "branch", None)
            .await
            .expect("comparison runs");
        assert!(!report.exact_match());
        assert_eq!(report.master().row_count(), 2);
        assert_eq!(report.branch().row_count(), 1);
    }

    #[tokio::test]
    async fn configured_equality_is_applied() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("master", table(&["v"], vec![vec!["a".into()]]))
                .respond("branch", table(&["v"], vec![vec!["a  ".into()]])),
        );
        let report = engine(backend)
            .with_options(CompareOptions {
                equality: ValueEquality {
                    trim_whitespace: true,
                    numeric_tolerance: None,
                },
                concurrent_pair: false,
            })
            .compare("master", "branch", None)
            .await
            .expect("comparison runs");
        assert!(report.exact_match());
    }
}
