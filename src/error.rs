use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComparerError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("query failed after {attempts} attempt(s): {sql}")]
    QueryExecution {
        sql: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("comparison task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ComparerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

pub type ComparerResult<T> = std::result::Result<T, ComparerError>;

pub fn sql_preview(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let preview: String = collapsed.chars().take(120).collect();
    if preview.len() < collapsed.len() {
        format!("{preview}...")
    } else {
        preview
    }
}
