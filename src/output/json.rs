use anyhow::{Context, Result};
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed rendering output as JSON")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::comparison::{BatchRunner, ComparisonEngine};
    use crate::executor::testing::{int_rows, ScriptedBackend};
    use crate::executor::QueryExecutor;
    use crate::output::json::render_json;

    #[tokio::test]
    async fn batch_json_lists_reports_and_failures() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .respond("source", int_rows("id", &[4]))
                .respond("master", int_rows("v", &[1]))
                .respond("branch", int_rows("v", &[1])),
        );
        let runner = BatchRunner::new(ComparisonEngine::new(QueryExecutor::new(backend)));
        let batch = runner
            .run_sweep("master", "branch", "source", |_| {})
            .await
            .expect("sweep runs");

        let rendered = render_json(&batch).expect("json renders");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(parsed["reports"][0]["exact_match"], true);
        assert_eq!(parsed["reports"][0]["parameters"]["id"], 4);
        assert_eq!(parsed["failures"].as_array().map(Vec::len), Some(0));
        assert!(parsed.get("report_rows").is_none());
    }
}
