//! Turns a [`Table`] and a column selection into a self-contained chart
//! description. Nothing here draws; see [`crate::app`] for the terminal view.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::table::{Table, TIMESTAMP};

const TICK_FORMAT: &str = "%Y-%m-%d %H:%M";
const PADDING_RATIO: f64 = 0.1;
/// Half-width of the x window when the table has a single row.
const SINGLE_POINT_SPAN: f64 = 1800.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no column selected for plotting")]
    NoColumns,

    #[error("column `{column}` does not exist in the table")]
    UnknownColumn { column: String },

    #[error("column `{column}` is the time axis and cannot be plotted as a series")]
    NotNumeric { column: String },

    #[error("table has no rows to plot")]
    EmptyTable,
}

/// Which columns to plot against `timestamp`, plus display text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartSpec {
    columns: Vec<String>,
    title: Option<String>,
    x_label: Option<String>,
    y_label: Option<String>,
}

impl ChartSpec {
    /// Repeated column names are dropped, keeping the first occurrence.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for column in columns.into_iter().map(Into::into) {
            if !unique.contains(&column) {
                unique.push(column);
            }
        }
        Self {
            columns: unique,
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = Some(label.into());
        self
    }

    pub fn y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = Some(label.into());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    pub bounds: [f64; 2],
    pub ticks: Vec<String>,
}

/// One plotted column. A missing cell closes the current segment, so the
/// line is broken there instead of interpolated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub segments: Vec<Vec<(f64, f64)>>,
}

impl Series {
    pub fn points(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.segments.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Everything needed to draw the chart. `x` values are Unix seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartArtifact {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub series: Vec<Series>,
}

pub fn render(table: &Table, spec: &ChartSpec) -> Result<ChartArtifact, RenderError> {
    if spec.columns.is_empty() {
        return Err(RenderError::NoColumns);
    }
    let mut columns: Vec<(&str, Vec<(DateTime<FixedOffset>, Option<f64>)>)> = Vec::new();
    for column in &spec.columns {
        if column == TIMESTAMP {
            return Err(RenderError::NotNumeric {
                column: column.clone(),
            });
        }
        let values = table
            .series(column)
            .ok_or_else(|| RenderError::UnknownColumn {
                column: column.clone(),
            })?;
        columns.push((column.as_str(), values));
    }
    let (first, last) = match (table.rows().first(), table.rows().last()) {
        (Some(first), Some(last)) => (first.timestamp(), last.timestamp()),
        _ => return Err(RenderError::EmptyTable),
    };

    let series: Vec<Series> = columns
        .into_iter()
        .map(|(name, values)| Series {
            name: name.to_string(),
            segments: segments(&values),
        })
        .collect();

    let x_axis = Axis {
        label: spec
            .x_label
            .clone()
            .unwrap_or_else(|| format!("time (UTC{})", first.offset())),
        bounds: x_bounds(first, last),
        ticks: x_ticks(table),
    };
    let (lo, hi) = y_bounds(&series);
    let y_axis = Axis {
        label: spec.y_label.clone().unwrap_or_else(|| y_label(table, &spec.columns)),
        bounds: [lo, hi],
        ticks: vec![
            format!("{lo:.1}"),
            format!("{:.1}", (lo + hi) / 2.0),
            format!("{hi:.1}"),
        ],
    };
    let title = spec
        .title
        .clone()
        .unwrap_or_else(|| format!("Hourly {}", spec.columns.join(", ")));

    info!(
        series = series.len(),
        points = series.iter().map(|s| s.points().count()).sum::<usize>(),
        "rendered chart"
    );
    Ok(ChartArtifact {
        title,
        x_axis,
        y_axis,
        series,
    })
}

fn segments(values: &[(DateTime<FixedOffset>, Option<f64>)]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (ts, value) in values {
        match value {
            Some(v) => current.push((ts.timestamp() as f64, *v)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn x_bounds(first: DateTime<FixedOffset>, last: DateTime<FixedOffset>) -> [f64; 2] {
    let (lo, hi) = (first.timestamp() as f64, last.timestamp() as f64);
    if hi > lo {
        [lo, hi]
    } else {
        [lo - SINGLE_POINT_SPAN, hi + SINGLE_POINT_SPAN]
    }
}

fn x_ticks(table: &Table) -> Vec<String> {
    let rows = table.rows();
    let mut ticks: Vec<String> = [0, rows.len() / 2, rows.len() - 1]
        .iter()
        .map(|&i| rows[i].timestamp().format(TICK_FORMAT).to_string())
        .collect();
    ticks.dedup();
    ticks
}

fn y_bounds(series: &[Series]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(Series::points)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &(_, y)| {
            (min.min(y), max.max(y))
        });
    if min > max {
        return (0.0, 1.0);
    }
    let padding = if (max - min).abs() > 1e-6 {
        (max - min) * PADDING_RATIO
    } else {
        1.0
    };
    (min - padding, max + padding)
}

/// A shared unit labels the axis on its own; otherwise each column is listed
/// with its unit.
fn y_label(table: &Table, columns: &[String]) -> String {
    let units: BTreeSet<Option<&str>> = columns.iter().map(|c| table.unit(c)).collect();
    match units.iter().next() {
        Some(Some(unit)) if units.len() == 1 && columns.len() > 1 => unit.to_string(),
        _ => columns
            .iter()
            .map(|c| match table.unit(c) {
                Some(unit) => format!("{c} ({unit})"),
                None => c.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::openmeteo::Variable;
    use crate::table::normalize;

    fn table() -> Table {
        let payload = json!({
            "utc_offset_seconds": 3600,
            "hourly_units": {
                "time": "iso8601",
                "temperature_2m": "°C",
                "dew_point_2m": "°C",
                "relative_humidity_2m": "%"
            },
            "hourly": {
                "time": [
                    "2024-01-01T00:00",
                    "2024-01-01T01:00",
                    "2024-01-01T02:00",
                    "2024-01-01T03:00",
                    "2024-01-01T04:00"
                ],
                "temperature_2m": [1.0, 2.0, null, 4.0, 5.0],
                "dew_point_2m": [-1.0, -1.5, -2.0, -2.5, -3.0],
                "relative_humidity_2m": [null, null, null, null, null]
            }
        });
        normalize(
            &payload,
            &[Variable::Temperature, Variable::DewPoint, Variable::Humidity],
        )
        .unwrap()
    }

    /// 2024-01-01T00:00+01:00 in Unix seconds.
    const T0: f64 = 1_704_063_600.0;

    #[test]
    fn one_series_per_column_with_gaps() {
        let chart = render(&table(), &ChartSpec::new(["temperature", "dew_point"])).unwrap();

        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].name, "temperature");
        assert_eq!(
            chart.series[0].segments,
            vec![
                vec![(T0, 1.0), (T0 + 3600.0, 2.0)],
                vec![(T0 + 3.0 * 3600.0, 4.0), (T0 + 4.0 * 3600.0, 5.0)],
            ]
        );
        assert_eq!(chart.series[1].segments.len(), 1);
        assert_eq!(chart.series[1].points().count(), 5);
    }

    #[test]
    fn axes_cover_the_data() {
        let chart = render(&table(), &ChartSpec::new(["temperature"])).unwrap();

        assert_eq!(chart.x_axis.bounds, [T0, T0 + 4.0 * 3600.0]);
        assert_eq!(
            chart.x_axis.ticks,
            vec!["2024-01-01 00:00", "2024-01-01 02:00", "2024-01-01 04:00"]
        );
        assert_eq!(chart.x_axis.label, "time (UTC+01:00)");

        let [lo, hi] = chart.y_axis.bounds;
        assert!((lo - 0.6).abs() < 1e-9);
        assert!((hi - 5.4).abs() < 1e-9);
        assert_eq!(chart.y_axis.label, "temperature (°C)");
        assert_eq!(chart.title, "Hourly temperature");
    }

    #[test]
    fn shared_unit_becomes_the_y_label() {
        let spec = ChartSpec::new(["temperature", "dew_point"]);
        assert_eq!(render(&table(), &spec).unwrap().y_axis.label, "°C");

        let spec = ChartSpec::new(["temperature", "humidity"]);
        assert_eq!(
            render(&table(), &spec).unwrap().y_axis.label,
            "temperature (°C), humidity (%)"
        );
    }

    #[test]
    fn explicit_labels_win() {
        let spec = ChartSpec::new(["temperature"])
            .title("Berlin")
            .x_label("local time")
            .y_label("degrees");
        let chart = render(&table(), &spec).unwrap();

        assert_eq!(chart.title, "Berlin");
        assert_eq!(chart.x_axis.label, "local time");
        assert_eq!(chart.y_axis.label, "degrees");
    }

    #[test]
    fn all_missing_column_yields_empty_series() {
        let chart = render(&table(), &ChartSpec::new(["humidity"])).unwrap();

        assert!(chart.series[0].is_empty());
        assert_eq!(chart.y_axis.bounds, [0.0, 1.0]);
    }

    #[test]
    fn repeated_columns_plot_once() {
        let spec = ChartSpec::new(["temperature", "dew_point", "temperature"]);
        assert_eq!(spec.columns(), ["temperature", "dew_point"]);

        let chart = render(&table(), &ChartSpec::new(["temperature", "temperature"])).unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.title, "Hourly temperature");
    }

    #[test]
    fn unknown_column_is_rejected() {
        let payload = json!({
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [1.2, 1.5]
            }
        });
        let table = normalize(&payload, &[Variable::Temperature]).unwrap();

        assert_eq!(
            render(&table, &ChartSpec::new(["humidity"])),
            Err(RenderError::UnknownColumn {
                column: "humidity".to_string()
            })
        );
    }

    #[test]
    fn selection_must_name_value_columns() {
        assert_eq!(
            render(&table(), &ChartSpec::new(Vec::<String>::new())),
            Err(RenderError::NoColumns)
        );
        assert_eq!(
            render(&table(), &ChartSpec::new([TIMESTAMP])),
            Err(RenderError::NotNumeric {
                column: TIMESTAMP.to_string()
            })
        );
    }

    #[test]
    fn empty_table_is_rejected() {
        let payload = json!({"hourly": {"time": [], "temperature_2m": []}});
        let table = normalize(&payload, &[Variable::Temperature]).unwrap();

        assert_eq!(
            render(&table, &ChartSpec::new(["temperature"])),
            Err(RenderError::EmptyTable)
        );
    }

    #[test]
    fn single_row_gets_a_window() {
        let payload = json!({"hourly": {"time": ["2024-01-01T00:00"], "temperature_2m": [3.0]}});
        let table = normalize(&payload, &[Variable::Temperature]).unwrap();

        let chart = render(&table, &ChartSpec::new(["temperature"])).unwrap();

        let t = 1_704_067_200.0;
        assert_eq!(chart.x_axis.bounds, [t - 1800.0, t + 1800.0]);
        assert_eq!(chart.x_axis.ticks, vec!["2024-01-01 00:00"]);
        assert_eq!(chart.y_axis.bounds, [2.0, 4.0]);
    }

    #[test]
    fn rendering_is_repeatable() {
        let table = table();
        let spec = ChartSpec::new(["temperature", "dew_point"]);

        assert_eq!(render(&table, &spec), render(&table, &spec));
    }
}
