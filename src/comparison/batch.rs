use std::error::Error as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::comparison::engine::{require_sql, ComparisonEngine};
use crate::comparison::report::ComparisonReport;
use crate::error::{ComparerError, ComparerResult};
use crate::tabular::ParameterSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOptions {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_in_flight() -> usize {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub row_index: usize,
    pub parameters: ParameterSet,
    pub error: String,
}

/// Reports in data-source row order. In continue mode the rows that failed are
/// listed in `failures` instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    reports: Vec<ComparisonReport>,
    #[serde(skip)]
    report_rows: Vec<usize>,
    failures: Vec<SweepFailure>,
}

impl BatchResult {
    pub fn reports(&self) -> &[ComparisonReport] {
        &self.reports
    }

    pub fn indexed_reports(&self) -> impl Iterator<Item = (usize, &ComparisonReport)> {
        self.report_rows.iter().copied().zip(self.reports.iter())
    }

    pub fn failures(&self) -> &[SweepFailure] {
        &self.failures
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.failures.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.exact_match()).count()
    }

    pub fn all_match(&self) -> bool {
        self.failures.is_empty() && self.mismatch_count() == 0
    }

    pub fn into_reports(self) -> Vec<ComparisonReport> {
        self.reports
    }
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    engine: ComparisonEngine,
    options: SweepOptions,
}

impl BatchRunner {
    pub fn new(engine: ComparisonEngine) -> Self {
        Self {
            engine,
            options: SweepOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &ComparisonEngine {
        &self.engine
    }

    /// `progress` receives `floor(100 * completed / total)` after every row,
    /// from this task only, so the sequence never decreases. An empty data
    /// source returns an empty result without calling `progress`.
    pub async fn run_sweep<F>(
        &self,
        master_sql: &str,
        branch_sql: &str,
        data_source_sql: &str,
        mut progress: F,
    ) -> ComparerResult<BatchResult>
    where
        F: FnMut(u8),
    {
        require_sql(master_sql, "master")?;
        require_sql(branch_sql, "branch")?;
        require_sql(data_source_sql, "data source")?;

        let source = self
            .engine
            .executor()
            .execute(data_source_sql, None)
            .await?;
        let param_sets = source
            .data
            .rows()
            .iter()
            .map(ParameterSet::from_row)
            .collect::<Vec<_>>();
        let total = param_sets.len();
        info!(rows = total, "starting sweep");

        let mut slots: Vec<Option<ComparisonReport>> = (0..total).map(|_| None).collect();
        let mut failures = Vec::new();
        let mut completed = 0usize;
        let limit = self.options.max_in_flight.max(1);
        let master: Arc<str> = Arc::from(master_sql);
        let branch: Arc<str> = Arc::from(branch_sql);

        let mut pending = param_sets.into_iter().enumerate();
        let mut tasks = JoinSet::new();
        loop {
            while tasks.len() < limit {
                let Some((index, params)) = pending.next() else {
                    break;
                };
                let engine = self.engine.clone();
                let master = Arc::clone(&master);
                let branch = Arc::clone(&branch);
                tasks.spawn(async move {
                    let outcome = engine.compare(&master, &branch, Some(&params)).await;
                    (index, params, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (index, params, outcome) = joined?;
            match outcome {
                Ok(report) => slots[index] = Some(report),
                Err(err) => match self.options.failure_policy {
                    FailurePolicy::Abort => {
                        tasks.abort_all();
                        return Err(err);
                    }
                    FailurePolicy::Continue => {
                        let error = error_chain(&err);
                        warn!(row = index, "comparison failed, continuing: {error}");
                        failures.push(SweepFailure {
                            row_index: index,
                            parameters: params,
                            error,
                        });
                    }
                },
            }

            completed += 1;
            progress(percent_complete(completed, total));
        }

        failures.sort_by_key(|f| f.row_index);
        let (report_rows, reports): (Vec<_>, Vec<_>) = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|report| (index, report)))
            .unzip();
        let result = BatchResult {
            reports,
            report_rows,
            failures,
        };
        info!(
            reports = result.report_count(),
            mismatches = result.mismatch_count(),
            failures = result.failures().len(),
            "sweep finished"
        );
        Ok(result)
    }
}

fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) * 100) / total) as u8
}

fn error_chain(err: &ComparerError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
