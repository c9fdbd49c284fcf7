use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OpenFlags, Statement, ToSql};

use crate::executor::QueryBackend;
use crate::tabular::{ParameterSet, ScalarValue, TabularResult};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteBackend {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch(&self, sql: &str, params: Option<&ParameterSet>) -> Result<TabularResult> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let sql = sql.to_string();
        let params = params.cloned();
        tokio::task::spawn_blocking(move || run_query(&path, busy_timeout, &sql, params.as_ref()))
            .await
            .context("sqlite worker did not complete")?
    }
}

fn run_query(
    path: &Path,
    busy_timeout: Duration,
    sql: &str,
    params: Option<&ParameterSet>,
) -> Result<TabularResult> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed opening sqlite database: {}", path.display()))?;
    conn.busy_timeout(busy_timeout)?;

    let mut stmt = conn.prepare(sql).context("failed preparing query")?;
    bind_parameters(&mut stmt, params)?;

    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let width = columns.len();
    let mut result = TabularResult::new(columns);

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(scalar_from_sqlite(row.get_ref(idx)?));
        }
        result.push_row(values)?;
    }
    Ok(result)
}

/// Binds `:name`, `@name` and `$name` placeholders by name. Positional `?`
/// placeholders have no name to match and are rejected.
fn bind_parameters(stmt: &mut Statement<'_>, params: Option<&ParameterSet>) -> Result<()> {
    for idx in 1..=stmt.parameter_count() {
        let name = stmt
            .parameter_name(idx)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("positional parameter #{idx} cannot be bound by name"))?;
        let key = name.trim_start_matches([':', '@', '$']);
        let value = params
            .and_then(|p| p.get(key))
            .ok_or_else(|| anyhow!("no value supplied for parameter {name}"))?;
        stmt.raw_bind_parameter(idx, value)?;
    }
    Ok(())
}

fn scalar_from_sqlite(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(v) => ScalarValue::Integer(v),
        ValueRef::Real(v) => ScalarValue::Real(v),
        ValueRef::Text(bytes) => ScalarValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => ScalarValue::Blob(bytes.to_vec()),
    }
}

impl ToSql for ScalarValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ScalarValue::Null => ToSqlOutput::Owned(Value::Null),
            ScalarValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            ScalarValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            ScalarValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            ScalarValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            ScalarValue::Date(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            ScalarValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}
