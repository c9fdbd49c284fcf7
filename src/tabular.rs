use std::collections::HashSet;
use std::fmt::{self, Display, Formatter, Write as _};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Comparison works on the [`Display`] form of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDateTime),
    Blob(Vec<u8>),
}

impl ScalarValue {
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Self::Integer(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            if v.is_finite() {
                return Self::Real(v);
            }
        }
        Self::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Date(v) => write!(f, "{v}"),
            Self::Blob(bytes) => f.write_str(&hex_upper(bytes)),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Date(v) => serializer.collect_str(v),
            Self::Blob(bytes) => serializer.serialize_str(&hex_upper(bytes)),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for ScalarValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column '{0}' does not exist in row")]
pub struct MissingColumn(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<ScalarValue>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.try_get(column).ok()
    }

    /// Exact name first. Otherwise a case-insensitive match, provided only one
    /// column matches that way.
    pub fn try_get(&self, column: &str) -> std::result::Result<&ScalarValue, MissingColumn> {
        self.column_index(column)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| MissingColumn(column.to_string()))
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == column) {
            return Some(idx);
        }
        let mut folded = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.eq_ignore_ascii_case(column))
            .map(|(idx, _)| idx);
        match (folded.next(), folded.next()) {
            (Some(idx), None) => Some(idx),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularResult {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl TabularResult {
    /// Creates an empty result. Repeated column names get a numeric suffix
    /// (`a`, `a1`, `a2`) so that names stay unique within a row.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = unique_column_names(columns.into_iter().map(Into::into));
        Self {
            columns: Arc::from(columns),
            rows: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<ScalarValue>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut result = Self::new(columns);
        for values in rows {
            result.push_row(values)?;
        }
        Ok(result)
    }

    pub fn push_row(&mut self, values: Vec<ScalarValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(anyhow!(
                "row has {} values but result has {} columns",
                values.len(),
                self.columns.len()
            ));
        }
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            values,
        });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for TabularResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TabularResult", 2)?;
        state.serialize_field("columns", &*self.columns)?;
        state.serialize_field("rows", &self.rows)?;
        state.end()
    }
}

fn unique_column_names(columns: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in columns {
        if seen.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{name}{suffix}");
            if seen.insert(candidate.clone()) {
                out.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ScalarValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_row(row: &Row) -> Self {
        row.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, ScalarValue)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, ScalarValue)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ParameterSet, ScalarValue, TabularResult};

    #[test]
    fn renders_values_as_comparison_text() {
        assert_eq!(ScalarValue::Null.to_string(), "");
        assert_eq!(ScalarValue::Integer(42).to_string(), "42");
        assert_eq!(ScalarValue::Real(1.5).to_string(), "1.5");
        assert_eq!(ScalarValue::Text("x ".into()).to_string(), "x ");
        assert_eq!(ScalarValue::Blob(vec![0xde, 0x01]).to_string(), "DE01");
        let date = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .expect("valid date");
        assert_eq!(ScalarValue::Date(date).to_string(), "2024-02-29 08:30:00");
    }

    #[test]
    fn parses_cli_literals() {
        assert_eq!(ScalarValue::parse_literal("NULL"), ScalarValue::Null);
        assert_eq!(ScalarValue::parse_literal("true"), ScalarValue::Bool(true));
        assert_eq!(ScalarValue::parse_literal("17"), ScalarValue::Integer(17));
        assert_eq!(ScalarValue::parse_literal("2.5"), ScalarValue::Real(2.5));
        assert_eq!(
            ScalarValue::parse_literal("inf-ish"),
            ScalarValue::Text("inf-ish".into())
        );
    }

    #[test]
    fn duplicate_columns_get_suffixes() {
        let result = TabularResult::new(["a", "a1", "a", "b"]);
        assert_eq!(result.columns(), ["a", "a1", "a2", "b"]);
    }

    #[test]
    fn push_row_rejects_width_mismatch() {
        let mut result = TabularResult::new(["id", "name"]);
        assert!(result.push_row(vec![ScalarValue::Integer(1)]).is_err());
        assert!(result
            .push_row(vec![ScalarValue::Integer(1), "a".into()])
            .is_ok());
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn row_lookup_reports_missing_column() {
        let result = TabularResult::from_rows(["id"], vec![vec![ScalarValue::Integer(7)]])
            .expect("valid rows");
        let row = result.row(0).expect("row present");
        assert_eq!(row.try_get("id"), Ok(&ScalarValue::Integer(7)));
        let err = row.try_get("name").expect_err("column should be missing");
        assert_eq!(err.0, "name");
    }

    #[test]
    fn row_lookup_falls_back_to_a_single_case_insensitive_match() {
        let result = TabularResult::from_rows(
            ["ID", "Name", "name"],
            vec![vec![ScalarValue::Integer(7), "a".into(), "b".into()]],
        )
        .expect("valid rows");
        let row = result.row(0).expect("row present");
        assert_eq!(row.try_get("id"), Ok(&ScalarValue::Integer(7)));
        assert_eq!(row.try_get("name"), Ok(&ScalarValue::Text("b".into())));
        assert_eq!(row.try_get("Name"), Ok(&ScalarValue::Text("a".into())));
        let err = row.try_get("NAME").expect_err("two columns fold to NAME");
        assert_eq!(err.0, "NAME");
    }

    #[test]
    fn parameter_set_from_row_keeps_column_order() {
        let result = TabularResult::from_rows(
            ["region", "year"],
            vec![vec!["north".into(), ScalarValue::Integer(2023)]],
        )
        .expect("valid rows");
        let params = ParameterSet::from_row(&result.rows()[0]);
        assert_eq!(params.to_json(), r#"{"region":"north","year":2023}"#);
        assert_eq!(params.get("YEAR"), Some(&ScalarValue::Integer(2023)));
    }

    #[test]
    fn parameter_insert_replaces_in_place() {
        let params = ParameterSet::new()
            .with("a", 1i64)
            .with("b", "x")
            .with("a", ScalarValue::Null);
        assert_eq!(params.len(), 2);
        assert_eq!(params.to_json(), r#"{"a":null,"b":"x"}"#);
    }
}
