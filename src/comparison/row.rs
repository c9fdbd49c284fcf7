use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::tabular::{MissingColumn, Row, ScalarValue};

/// Default equality is exact rendered text: `1` and `1.0` differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueEquality {
    #[serde(default)]
    pub trim_whitespace: bool,
    #[serde(default)]
    pub numeric_tolerance: Option<f64>,
}

impl ValueEquality {
    pub fn textual() -> Self {
        Self::default()
    }

    pub fn is_textual(&self) -> bool {
        !self.trim_whitespace && self.numeric_tolerance.is_none()
    }

    pub fn values_equal(&self, master: &ScalarValue, branch: &ScalarValue) -> bool {
        let master_text = master.to_string();
        let branch_text = branch.to_string();
        if master_text == branch_text {
            return true;
        }
        if self.trim_whitespace && master_text.trim() == branch_text.trim() {
            return true;
        }
        if let Some(tolerance) = self.numeric_tolerance {
            if let (Some(m), Some(b)) = (master.as_f64(), branch.as_f64()) {
                return (m - b).abs() <= tolerance;
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellDifference {
    ValueMismatch {
        column: String,
        master: String,
        branch: String,
    },
    MissingFromBranch {
        column: String,
    },
    MissingFromMaster {
        column: String,
    },
}

impl CellDifference {
    pub fn column(&self) -> &str {
        match self {
            Self::ValueMismatch { column, .. }
            | Self::MissingFromBranch { column }
            | Self::MissingFromMaster { column } => column,
        }
    }
}

impl Display for CellDifference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueMismatch {
                column,
                master,
                branch,
            } => write!(f, "{column} differs: {master} (M) - {branch} (B)"),
            Self::MissingFromBranch { column } => write!(f, "{column} missing from branch"),
            Self::MissingFromMaster { column } => write!(f, "{column} missing from master"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowDiff {
    pub differences: Vec<CellDifference>,
}

impl RowDiff {
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn render(&self) -> String {
        self.differences
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RowComparator {
    equality: ValueEquality,
}

impl RowComparator {
    pub fn new(equality: ValueEquality) -> Self {
        Self { equality }
    }

    pub fn equality(&self) -> ValueEquality {
        self.equality
    }

    pub fn compare_rows(&self, master: &Row, branch: &Row) -> RowDiff {
        let mut differences = Vec::new();

        for (column, master_value) in master.iter() {
            match branch.try_get(column) {
                Ok(branch_value) => {
                    if !self.equality.values_equal(master_value, branch_value) {
                        differences.push(CellDifference::ValueMismatch {
                            column: column.to_string(),
                            master: master_value.to_string(),
                            branch: branch_value.to_string(),
                        });
                    }
                }
                Err(MissingColumn(column)) => {
                    differences.push(CellDifference::MissingFromBranch { column });
                }
            }
        }

        for column in branch.columns() {
            if let Err(MissingColumn(column)) = master.try_get(column) {
                differences.push(CellDifference::MissingFromMaster { column });
            }
        }

        RowDiff { differences }
    }
}
