use anyhow::Result;

use crate::comparison::{BatchResult, CellDifference, ComparisonReport};

pub fn batch_to_csv(batch: &BatchResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "row",
        "result_id",
        "parameters",
        "master_rows",
        "branch_rows",
        "master_secs",
        "branch_secs",
        "exact_match",
        "error",
    ])?;
    for (index, report) in batch.indexed_reports() {
        writer.write_record([
            index.to_string(),
            report.id().to_string(),
            report.parameters_json(),
            report.master().row_count().to_string(),
            report.branch().row_count().to_string(),
            format!("{:.4}", report.master_elapsed().as_secs_f64()),
            format!("{:.4}", report.branch_elapsed().as_secs_f64()),
            report.exact_match().to_string(),
            String::new(),
        ])?;
    }
    for failure in batch.failures() {
        writer.write_record([
            failure.row_index.to_string(),
            String::new(),
            failure.parameters.to_json(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            "false".to_string(),
            failure.error.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn differences_to_csv(report: &ComparisonReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["row", "column", "kind", "master", "branch"])?;
    for diff in report.row_differences() {
        for cell in &diff.cells {
            let (kind, master, branch) = match cell {
                CellDifference::ValueMismatch { master, branch, .. } => {
                    ("value_mismatch", master.as_str(), branch.as_str())
                }
                CellDifference::MissingFromBranch { .. } => ("missing_from_branch", "", ""),
                CellDifference::MissingFromMaster { .. } => ("missing_from_master", "", ""),
            };
            writer.write_record([
                diff.row_index.to_string().as_str(),
                cell.column(),
                kind,
                master,
                branch,
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
