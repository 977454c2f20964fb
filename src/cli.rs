use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::builder::{styling::AnsiColor, Styles};
use clap::Parser;

use crate::chart::ChartSpec;
use crate::openmeteo::{ClientConfig, QueryError, QueryParameters, Variable};

const ABOUT: &str = "Open-Meteo hourly chart";

const LONG_ABOUT: &str = "
Fetch hourly weather variables from Open-Meteo for a location and plot them in the terminal.

Coordinates are decimal degrees; west and south are negative. Variables may be given by their
short name (temperature, humidity, wind_speed, ...) or by the Open-Meteo parameter name
(temperature_2m, relative_humidity_2m, ...). Press `q` to close the chart.
";

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug)]
#[command(version, styles=STYLES, about=ABOUT, long_about = LONG_ABOUT)]
pub struct Args {
    #[arg(allow_negative_numbers = true, help = "Latitude in decimal degrees")]
    pub latitude: f64,

    #[arg(allow_negative_numbers = true, help = "Longitude in decimal degrees")]
    pub longitude: f64,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "temperature",
        help = "Hourly variables to request"
    )]
    pub variables: Vec<Variable>,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Columns to plot (defaults to every requested variable)"
    )]
    pub plot: Vec<String>,

    #[arg(long, help = "First day to fetch (YYYY-MM-DD)")]
    pub start: Option<NaiveDate>,

    #[arg(long, help = "Last day to fetch (YYYY-MM-DD)")]
    pub end: Option<NaiveDate>,

    #[arg(long, default_value = "auto", help = "Timezone for returned timestamps")]
    pub timezone: String,

    #[arg(long, default_value_t = 10, help = "Request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Chart title")]
    pub title: Option<String>,

    #[arg(long, default_value_t = 24, help = "Number of table rows to print")]
    pub rows: usize,

    #[arg(short, long, help = "Write the chart as JSON to this file")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Do not open the terminal chart")]
    pub no_display: bool,
}

impl Args {
    pub fn query(&self) -> Result<QueryParameters, QueryError> {
        let params = QueryParameters::new(self.latitude, self.longitude, self.variables.clone())?
            .with_timezone(self.timezone.clone());
        match (self.start, self.end) {
            (Some(start), Some(end)) => params.with_range(start, end),
            (None, None) => Ok(params),
            _ => Err(QueryError::IncompleteRange),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout),
            ..ClientConfig::default()
        }
    }

    pub fn chart_spec(&self, params: &QueryParameters) -> ChartSpec {
        let spec = if self.plot.is_empty() {
            ChartSpec::new(params.variables().iter().map(|v| v.name()))
        } else {
            ChartSpec::new(self.plot.iter().cloned())
        };
        match &self.title {
            Some(title) => spec.title(title.clone()),
            None => spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("wxplot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["52.52", "13.41"]);
        let params = args.query().unwrap();

        assert_eq!(params.variables(), [Variable::Temperature]);
        assert_eq!(params.timezone(), "auto");
        assert_eq!(params.range(), None);
        assert_eq!(args.client_config().timeout, Duration::from_secs(10));
        assert_eq!(args.chart_spec(&params).columns(), ["temperature"]);
    }

    #[test]
    fn accepts_negative_coordinates_and_lists() {
        let args = parse(&[
            "-33.87",
            "-151.2",
            "--variables",
            "temperature_2m,wind_speed",
            "--plot",
            "wind_speed",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-02",
        ]);
        let params = args.query().unwrap();

        assert_eq!(params.latitude(), -33.87);
        assert_eq!(params.longitude(), -151.2);
        assert_eq!(params.variables(), [Variable::Temperature, Variable::WindSpeed]);
        assert!(params.range().is_some());
        assert_eq!(args.chart_spec(&params).columns(), ["wind_speed"]);
    }

    #[test]
    fn rejects_unknown_variable() {
        let res = Args::try_parse_from(["wxplot", "0", "0", "--variables", "sunshine"]);
        assert!(res.is_err());
    }

    #[test]
    fn lone_range_bound_is_incomplete() {
        let args = parse(&["0", "0", "--start", "2024-01-01"]);
        assert_eq!(args.query(), Err(QueryError::IncompleteRange));
    }

    #[test]
    fn coordinates_are_validated() {
        let args = parse(&["91", "0"]);
        assert_eq!(args.query(), Err(QueryError::LatitudeOutOfRange(91.0)));
    }
}
