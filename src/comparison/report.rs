use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::comparison::row::{CellDifference, RowComparator};
use crate::executor::TimedResult;
use crate::tabular::{ParameterSet, TabularResult};

pub const BRANCH_RAN_OUT: &str = "Branch sql does not contain any more rows";
pub const BRANCH_HAS_MORE: &str = "Branch sql still has additional rows";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDifference {
    pub row_index: usize,
    pub cells: Vec<CellDifference>,
}

// `exact_match` starts true and only a recorded difference clears it.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    id: Uuid,
    created_at: DateTime<Utc>,
    parameters: Option<ParameterSet>,
    master: TabularResult,
    branch: TabularResult,
    #[serde(serialize_with = "serialize_secs")]
    master_elapsed: Duration,
    #[serde(serialize_with = "serialize_secs")]
    branch_elapsed: Duration,
    exact_match: bool,
    summary_findings: Vec<String>,
    detailed_findings: Vec<String>,
    row_differences: Vec<RowDifference>,
}

impl ComparisonReport {
    pub(crate) fn analyse(
        parameters: Option<ParameterSet>,
        master: TimedResult,
        branch: TimedResult,
        comparator: &RowComparator,
    ) -> Self {
        let mut report = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            parameters,
            master: master.data,
            branch: branch.data,
            master_elapsed: master.elapsed,
            branch_elapsed: branch.elapsed,
            exact_match: true,
            summary_findings: Vec::new(),
            detailed_findings: Vec::new(),
            row_differences: Vec::new(),
        };
        report.setup_header();
        report.compare_execution_time();
        report.compare_row_counts();
        report.compare_individual_rows(comparator);
        report.add_match_result();
        report
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn parameters(&self) -> Option<&ParameterSet> {
        self.parameters.as_ref()
    }

    pub fn master(&self) -> &TabularResult {
        &self.master
    }

    pub fn branch(&self) -> &TabularResult {
        &self.branch
    }

    pub fn master_elapsed(&self) -> Duration {
        self.master_elapsed
    }

    pub fn branch_elapsed(&self) -> Duration {
        self.branch_elapsed
    }

    pub fn exact_match(&self) -> bool {
        self.exact_match
    }

    pub fn summary_findings(&self) -> &[String] {
        &self.summary_findings
    }

    pub fn detailed_findings(&self) -> &[String] {
        &self.detailed_findings
    }

    pub fn row_differences(&self) -> &[RowDifference] {
        &self.row_differences
    }

    pub fn parameters_json(&self) -> String {
        self.parameters
            .as_ref()
            .map(ParameterSet::to_json)
            .unwrap_or_else(|| "null".to_string())
    }

    fn record_mismatch(&mut self) {
        self.exact_match = false;
    }

    fn setup_header(&mut self) {
        let id_line = format!("Detailed result id: '{}'", self.id);
        self.summary_findings.push(id_line.clone());
        self.summary_findings
            .push(format!("Parameters: {}", self.parameters_json()));
        self.detailed_findings.push(id_line);
    }

    fn compare_execution_time(&mut self) {
        self.summary_findings.push(format!(
            "Execution times: {:.4} (M), {:.4} (B)",
            self.master_elapsed.as_secs_f64(),
            self.branch_elapsed.as_secs_f64()
        ));
    }

    fn compare_row_counts(&mut self) {
        let master_rows = self.master.row_count();
        let branch_rows = self.branch.row_count();
        if master_rows != branch_rows {
            self.summary_findings.push(format!(
                "Row counts differ: {master_rows} (M), {branch_rows} (B)"
            ));
            self.record_mismatch();
        } else {
            self.summary_findings
                .push(format!("Row counts identical: {master_rows}"));
        }
    }

    /// Rows are paired by position only; reordered but otherwise equal
    /// results are reported as differences.
    fn compare_individual_rows(&mut self, comparator: &RowComparator) {
        let master_rows = self.master.row_count();
        let branch_rows = self.branch.row_count();

        let mut findings = Vec::new();
        let mut differences = Vec::new();
        for (index, (master_row, branch_row)) in self
            .master
            .rows()
            .iter()
            .zip(self.branch.rows())
            .enumerate()
        {
            let diff = comparator.compare_rows(master_row, branch_row);
            if !diff.is_empty() {
                findings.push(diff.render());
                differences.push(RowDifference {
                    row_index: index,
                    cells: diff.differences,
                });
            }
        }
        if !differences.is_empty() {
            self.record_mismatch();
        }
        self.detailed_findings.extend(findings);
        self.row_differences = differences;

        if master_rows > branch_rows {
            self.detailed_findings.push(BRANCH_RAN_OUT.to_string());
            self.record_mismatch();
        }
        if branch_rows > master_rows {
            self.detailed_findings.push(BRANCH_HAS_MORE.to_string());
            self.record_mismatch();
        }
    }

    fn add_match_result(&mut self) {
        let verdict = if self.exact_match { "YES" } else { "NO" };
        self.summary_findings
            .push(format!("Results match? {verdict}"));
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
