//! Row-oriented view of the provider's parallel `hourly` arrays.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::openmeteo::Variable;

/// Name of the mandatory first column.
pub const TIMESTAMP: &str = "timestamp";

const TIME_KEY: &str = "time";
const TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];
const MISSING: &str = "--";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("unexpected payload structure: {detail}")]
    MalformedPayload { detail: String },

    #[error("variable `{variable}` ({}) is missing from the payload", .variable.api_name())]
    MissingVariable { variable: Variable },

    #[error("`{variable}` has {found} values but there are {expected} timestamps")]
    ShapeMismatch {
        variable: Variable,
        expected: usize,
        found: usize,
    },

    #[error("`{variable}` holds a non-numeric value at index {index}")]
    InvalidValue { variable: Variable, index: usize },

    #[error("cannot parse timestamp {value} at index {index}")]
    InvalidTimestamp { index: usize, value: String },

    #[error("timestamp at index {index} does not come after its predecessor")]
    Unordered { index: usize },
}

#[derive(Deserialize, Debug)]
struct Payload {
    #[serde(default)]
    utc_offset_seconds: i32,

    #[serde(default)]
    hourly_units: HashMap<String, Value>,

    hourly: Hourly,
}

#[derive(Deserialize, Debug)]
struct Hourly {
    time: Vec<Value>,

    #[serde(flatten)]
    columns: HashMap<String, Value>,
}

/// One timestamped observation. Values line up with the table's columns
/// after `timestamp`.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    timestamp: DateTime<FixedOffset>,
    values: Vec<Option<f64>>,
}

impl TableRow {
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// A single cell, addressed by row index and column name.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell {
    Timestamp(DateTime<FixedOffset>),
    Number(f64),
    Missing,
}

/// Immutable normalized table. Rows are strictly ascending by timestamp and
/// all share the same columns, `timestamp` first.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    units: Vec<Option<String>>,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn unit(&self, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.units[idx].as_deref()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<Cell> {
        let row = self.rows.get(row)?;
        match self.column_index(column)? {
            0 => Some(Cell::Timestamp(row.timestamp)),
            idx => Some(match row.values[idx - 1] {
                Some(v) => Cell::Number(v),
                None => Cell::Missing,
            }),
        }
    }

    /// `(timestamp, value)` pairs of a value column, `None` for `timestamp`
    /// or unknown names.
    pub fn series(&self, column: &str) -> Option<Vec<(DateTime<FixedOffset>, Option<f64>)>> {
        let idx = self.column_index(column)?.checked_sub(1)?;
        Some(
            self.rows
                .iter()
                .map(|row| (row.timestamp, row.values[idx]))
                .collect(),
        )
    }

    pub fn preview(&self, rows: usize) -> Preview<'_> {
        Preview { table: self, rows }
    }
}

/// Aligned text rendering of the first rows of a [`Table`].
pub struct Preview<'a> {
    table: &'a Table,
    rows: usize,
}

impl fmt::Display for Preview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.table.rows[..self.rows.min(self.table.len())];
        let cells: Vec<Vec<String>> = shown
            .iter()
            .map(|row| {
                std::iter::once(row.timestamp.format("%Y-%m-%d %H:%M").to_string())
                    .chain(row.values.iter().map(|v| match v {
                        Some(v) => v.to_string(),
                        None => MISSING.to_string(),
                    }))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .table
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for (i, name) in self.table.columns.iter().enumerate() {
            if i == 0 {
                write!(f, "{name:<w$}", w = widths[i])?;
            } else {
                write!(f, "  {name:>w$}", w = widths[i])?;
            }
        }
        writeln!(f)?;
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if i == 0 {
                    write!(f, "{cell:<w$}", w = widths[i])?;
                } else {
                    write!(f, "  {cell:>w$}", w = widths[i])?;
                }
            }
            writeln!(f)?;
        }
        let hidden = self.table.len() - shown.len();
        if hidden > 0 {
            writeln!(f, "... {hidden} more rows")?;
        }
        Ok(())
    }
}

/// Zips the `hourly.time` array with one array per requested variable.
///
/// The provider is expected to return rows already in ascending order; this
/// is checked rather than fixed up.
pub fn normalize(payload: &Value, variables: &[Variable]) -> Result<Table, NormalizationError> {
    let payload = Payload::deserialize(payload).map_err(|err| {
        let keys: Vec<&str> = payload
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        NormalizationError::MalformedPayload {
            detail: format!("missing hourly/{TIME_KEY} ({err}); root keys: {keys:?}"),
        }
    })?;
    let expected = payload.hourly.time.len();

    let mut arrays: Vec<&Vec<Value>> = Vec::with_capacity(variables.len());
    for &variable in variables {
        let column = payload
            .hourly
            .columns
            .get(variable.api_name())
            .ok_or(NormalizationError::MissingVariable { variable })?;
        let array = column
            .as_array()
            .ok_or_else(|| NormalizationError::MalformedPayload {
                detail: format!("`{}` is not an array", variable.api_name()),
            })?;
        if array.len() != expected {
            return Err(NormalizationError::ShapeMismatch {
                variable,
                expected,
                found: array.len(),
            });
        }
        arrays.push(array);
    }

    let offset = FixedOffset::east_opt(payload.utc_offset_seconds).ok_or_else(|| {
        NormalizationError::MalformedPayload {
            detail: format!("utc_offset_seconds {} is out of range", payload.utc_offset_seconds),
        }
    })?;

    let mut rows: Vec<TableRow> = Vec::with_capacity(expected);
    for (index, raw) in payload.hourly.time.iter().enumerate() {
        let timestamp = parse_timestamp(raw, offset)
            .ok_or_else(|| NormalizationError::InvalidTimestamp {
                index,
                value: raw.to_string(),
            })?;
        if let Some(prev) = rows.last() {
            if timestamp <= prev.timestamp {
                return Err(NormalizationError::Unordered { index });
            }
        }

        let values = variables
            .iter()
            .zip(&arrays)
            .map(|(&variable, array)| match &array[index] {
                Value::Null => Ok(None),
                Value::Number(n) => n
                    .as_f64()
                    .map(Some)
                    .ok_or(NormalizationError::InvalidValue { variable, index }),
                _ => Err(NormalizationError::InvalidValue { variable, index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(TableRow { timestamp, values });
    }

    let unit_of = |key: &str| {
        payload
            .hourly_units
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let columns = std::iter::once(TIMESTAMP.to_string())
        .chain(variables.iter().map(|v| v.name().to_string()))
        .collect();
    let units = std::iter::once(unit_of(TIME_KEY))
        .chain(variables.iter().map(|v| unit_of(v.api_name())))
        .collect();

    debug!(rows = rows.len(), offset = %offset, "built table");
    Ok(Table {
        columns,
        units,
        rows,
    })
}

fn parse_timestamp(raw: &Value, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = raw.as_str()?.trim();
    let naive = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })?;
    offset.from_local_datetime(&naive).single()
}
