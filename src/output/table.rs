use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::comparison::{BatchResult, CellDifference, ComparisonReport};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn verdict_cell(exact_match: bool) -> Cell {
    if exact_match {
        Cell::new("YES").fg(Color::Green)
    } else {
        Cell::new("NO").fg(Color::Red)
    }
}

pub fn render_report(report: &ComparisonReport, details: bool) -> String {
    let mut summary = new_table();
    summary.set_header(vec!["Summary"]);
    for line in report.summary_findings() {
        summary.add_row(vec![line.clone()]);
    }

    let mut out = summary.to_string();
    if details {
        let mut detailed = new_table();
        detailed.set_header(vec!["Details"]);
        for line in report.detailed_findings() {
            detailed.add_row(vec![line.clone()]);
        }
        out.push('\n');
        out.push_str(&detailed.to_string());
        if !report.row_differences().is_empty() {
            out.push('\n');
            out.push_str(&render_differences_table(report));
        }
    }
    out
}

pub fn render_differences_table(report: &ComparisonReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Row", "Column", "Master", "Branch"]);
    for diff in report.row_differences() {
        for cell in &diff.cells {
            let (master, branch) = match cell {
                CellDifference::ValueMismatch { master, branch, .. } => {
                    (master.clone(), branch.clone())
                }
                CellDifference::MissingFromBranch { .. } => ("-".to_string(), "(missing)".to_string()),
                CellDifference::MissingFromMaster { .. } => ("(missing)".to_string(), "-".to_string()),
            };
            table.add_row(vec![
                diff.row_index.to_string(),
                cell.column().to_string(),
                master,
                branch,
            ]);
        }
    }
    table.to_string()
}

pub fn render_batch_table(batch: &BatchResult) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Row",
        "Result id",
        "Parameters",
        "Rows (M/B)",
        "Seconds (M/B)",
        "Match",
    ]);

    for (index, report) in batch.indexed_reports() {
        table.add_row(Row::from(vec![
            Cell::new(index.to_string()),
            Cell::new(report.id().to_string()),
            Cell::new(report.parameters_json()),
            Cell::new(format!(
                "{}/{}",
                report.master().row_count(),
                report.branch().row_count()
            )),
            Cell::new(format!(
                "{:.3}/{:.3}",
                report.master_elapsed().as_secs_f64(),
                report.branch_elapsed().as_secs_f64()
            )),
            verdict_cell(report.exact_match()),
        ]));
    }
    for failure in batch.failures() {
        table.add_row(Row::from(vec![
            Cell::new(failure.row_index.to_string()),
            Cell::new("-"),
            Cell::new(failure.parameters.to_json()),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("FAILED").fg(Color::Red),
        ]));
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "\nCompared: {}  Mismatches: {}  Failures: {}",
        batch.report_count(),
        batch.mismatch_count(),
        batch.failures().len()
    ));
    for failure in batch.failures() {
        out.push_str(&format!("\nRow {} failed: {}", failure.row_index, failure.error));
    }
    out
}
