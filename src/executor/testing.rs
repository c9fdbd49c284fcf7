use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::executor::QueryBackend;
use crate::tabular::{ParameterSet, ScalarValue, TabularResult};

type Responder = Arc<dyn Fn(Option<&ParameterSet>) -> Result<TabularResult> + Send + Sync>;

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    responders: HashMap<String, Responder>,
    fail_always: HashSet<String>,
    remaining_failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<(String, Option<ParameterSet>)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, sql: &str, result: TabularResult) -> Self {
        self.respond_with(sql, move |_| Ok(result.clone()))
    }

    pub fn respond_with<F>(mut self, sql: &str, responder: F) -> Self
    where
        F: Fn(Option<&ParameterSet>) -> Result<TabularResult> + Send + Sync + 'static,
    {
        self.responders.insert(sql.to_string(), Arc::new(responder));
        self
    }

    pub fn fail_first(self, sql: &str, times: u32) -> Self {
        self.remaining_failures
            .lock()
            .expect("failure map poisoned")
            .insert(sql.to_string(), times);
        self
    }

    pub fn fail_always(mut self, sql: &str) -> Self {
        self.fail_always.insert(sql.to_string());
        self
    }

    pub fn call_count(&self, sql: &str) -> usize {
        self.calls
            .lock()
            .expect("call log poisoned")
            .iter()
            .filter(|(s, _)| s == sql)
            .count()
    }

    pub fn calls(&self) -> Vec<(String, Option<ParameterSet>)> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, sql: &str, params: Option<&ParameterSet>) -> Result<TabularResult> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push((sql.to_string(), params.cloned()));
        if self.fail_always.contains(sql) {
            return Err(anyhow!("scripted failure for {sql}"));
        }
        {
            let mut remaining = self.remaining_failures.lock().expect("failure map poisoned");
            if let Some(count) = remaining.get_mut(sql) {
                if *count > 0 {
                    *count -= 1;
                    return Err(anyhow!("transient failure for {sql}"));
                }
            }
        }
        let responder = self
            .responders
            .get(sql)
            .ok_or_else(|| anyhow!("no scripted response for {sql}"))?;
        responder(params)
    }
}

pub(crate) fn int_rows(column: &str, values: &[i64]) -> TabularResult {
    TabularResult::from_rows(
        [column],
        values
            .iter()
            .map(|v| vec![ScalarValue::Integer(*v)])
            .collect(),
    )
    .expect("single column rows")
}

pub(crate) fn table(columns: &[&str], rows: Vec<Vec<ScalarValue>>) -> TabularResult {
    TabularResult::from_rows(columns.iter().copied(), rows).expect("rows match columns")
}
