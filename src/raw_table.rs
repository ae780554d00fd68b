use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header + row-set table as returned by the stats endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        self.rows.iter().map(move |values| RawRow {
            table: self,
            values,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    table: &'a RawTable,
    values: &'a [Value],
}

impl<'a> RawRow<'a> {
    /// Cell by header name; JSON nulls read as absent.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.table.column(name)?;
        self.values.get(idx).filter(|v| !v.is_null())
    }

    pub fn first_of(&self, names: &[&str]) -> Option<&'a Value> {
        names.iter().find_map(|name| self.get(name))
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name)?.as_str().map(str::trim)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(as_f64_any)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(as_i64_any)
    }
}

/// Picks the result set named `preferred` from a `resultSets` payload,
/// falling back to the first one. `null` and empty bodies yield an empty table.
pub fn parse_result_set(raw: &str, preferred: &str) -> Result<RawTable> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(RawTable::default());
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid stats json")?;

    let sets = match value.get("resultSets") {
        Some(Value::Array(sets)) => sets.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        _ => match value.get("resultSet") {
            Some(single @ Value::Object(_)) => vec![single.clone()],
            Some(Value::Array(sets)) => sets.clone(),
            _ => return Err(anyhow!("payload has no resultSets")),
        },
    };

    let chosen = sets
        .iter()
        .find(|set| {
            set.get("name")
                .and_then(|n| n.as_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(preferred))
        })
        .or_else(|| sets.first());
    let Some(set) = chosen else {
        return Ok(RawTable::default());
    };

    let headers = set
        .get("headers")
        .and_then(|h| h.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|h| h.as_str().map(|s| s.to_string()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let rows = set
        .get("rowSet")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|row| row.as_array().cloned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if headers.is_empty() && !rows.is_empty() {
        return Err(anyhow!("result set '{preferred}' has rows but no headers"));
    }
    Ok(RawTable { headers, rows })
}

pub fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return n.is_finite().then_some(n);
    }
    let n = v.as_str()?.trim().parse::<f64>().ok()?;
    n.is_finite().then_some(n)
}

pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(s) = v.as_str() {
        return s.trim().parse::<i64>().ok();
    }
    None
}
