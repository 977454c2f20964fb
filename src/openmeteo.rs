//! Client for the Open-Meteo hourly forecast endpoint.
//!
//! A request is a single blocking GET; the decoded JSON is handed to
//! [`crate::table::normalize`] and never kept around.

use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::table::{normalize, Table};

pub use query::{DateRange, QueryError, QueryParameters};
pub use variable::{ParseVariableError, Variable};

pub const BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const USER_AGENT: &str = concat!("wxplot/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_SNIPPET_LEN: usize = 300;

pub mod variable {
    use std::fmt;
    use std::str::FromStr;

    use thiserror::Error;

    /// Hourly quantities the provider knows how to return.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Variable {
        Temperature,
        Humidity,
        DewPoint,
        ApparentTemperature,
        Precipitation,
        Rain,
        Snowfall,
        CloudCover,
        Pressure,
        SurfacePressure,
        WindSpeed,
        WindDirection,
        WindGusts,
        Visibility,
    }

    const ALL: [Variable; 14] = [
        Variable::Temperature,
        Variable::Humidity,
        Variable::DewPoint,
        Variable::ApparentTemperature,
        Variable::Precipitation,
        Variable::Rain,
        Variable::Snowfall,
        Variable::CloudCover,
        Variable::Pressure,
        Variable::SurfacePressure,
        Variable::WindSpeed,
        Variable::WindDirection,
        Variable::WindGusts,
        Variable::Visibility,
    ];

    impl Variable {
        pub fn all() -> &'static [Variable] {
            &ALL
        }

        /// Column name used in the normalized table.
        pub fn name(self) -> &'static str {
            match self {
                Variable::Temperature => "temperature",
                Variable::Humidity => "humidity",
                Variable::DewPoint => "dew_point",
                Variable::ApparentTemperature => "apparent_temperature",
                Variable::Precipitation => "precipitation",
                Variable::Rain => "rain",
                Variable::Snowfall => "snowfall",
                Variable::CloudCover => "cloud_cover",
                Variable::Pressure => "pressure",
                Variable::SurfacePressure => "surface_pressure",
                Variable::WindSpeed => "wind_speed",
                Variable::WindDirection => "wind_direction",
                Variable::WindGusts => "wind_gusts",
                Variable::Visibility => "visibility",
            }
        }

        /// Name of the `hourly` parameter and of the payload key.
        pub fn api_name(self) -> &'static str {
            match self {
                Variable::Temperature => "temperature_2m",
                Variable::Humidity => "relative_humidity_2m",
                Variable::DewPoint => "dew_point_2m",
                Variable::ApparentTemperature => "apparent_temperature",
                Variable::Precipitation => "precipitation",
                Variable::Rain => "rain",
                Variable::Snowfall => "snowfall",
                Variable::CloudCover => "cloud_cover",
                Variable::Pressure => "pressure_msl",
                Variable::SurfacePressure => "surface_pressure",
                Variable::WindSpeed => "wind_speed_10m",
                Variable::WindDirection => "wind_direction_10m",
                Variable::WindGusts => "wind_gusts_10m",
                Variable::Visibility => "visibility",
            }
        }
    }

    impl fmt::Display for Variable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    #[error("unknown variable `{0}`")]
    pub struct ParseVariableError(pub String);

    impl FromStr for Variable {
        type Err = ParseVariableError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let wanted = s.trim().to_ascii_lowercase();
            ALL.iter()
                .copied()
                .find(|v| v.name() == wanted || v.api_name() == wanted)
                .ok_or_else(|| ParseVariableError(s.to_string()))
        }
    }

}

pub mod query {
    use super::*;

    use chrono::NaiveDate;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum QueryError {
        #[error("latitude {0} is outside [-90, 90]")]
        LatitudeOutOfRange(f64),

        #[error("longitude {0} is outside [-180, 180]")]
        LongitudeOutOfRange(f64),

        #[error("at least one variable must be requested")]
        NoVariables,

        #[error("start date {start} is after end date {end}")]
        InvertedRange { start: NaiveDate, end: NaiveDate },

        #[error("a date range needs both a start and an end date")]
        IncompleteRange,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DateRange {
        pub start: NaiveDate,
        pub end: NaiveDate,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct QueryParameters {
        latitude: f64,
        longitude: f64,
        variables: Vec<Variable>,
        range: Option<DateRange>,
        timezone: String,
    }

    impl QueryParameters {
        /// Repeated variables are dropped, keeping the first occurrence.
        pub fn new<I>(latitude: f64, longitude: f64, variables: I) -> Result<Self, QueryError>
        where
            I: IntoIterator<Item = Variable>,
        {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(QueryError::LatitudeOutOfRange(latitude));
            }
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(QueryError::LongitudeOutOfRange(longitude));
            }

            let mut unique: Vec<Variable> = Vec::new();
            for v in variables {
                if !unique.contains(&v) {
                    unique.push(v);
                }
            }
            if unique.is_empty() {
                return Err(QueryError::NoVariables);
            }

            Ok(Self {
                latitude,
                longitude,
                variables: unique,
                range: None,
                timezone: "auto".to_string(),
            })
        }

        pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
            if start > end {
                return Err(QueryError::InvertedRange { start, end });
            }
            self.range = Some(DateRange { start, end });
            Ok(self)
        }

        pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
            self.timezone = timezone.into();
            self
        }

        pub fn latitude(&self) -> f64 {
            self.latitude
        }

        pub fn longitude(&self) -> f64 {
            self.longitude
        }

        pub fn variables(&self) -> &[Variable] {
            &self.variables
        }

        pub fn range(&self) -> Option<DateRange> {
            self.range
        }

        pub fn timezone(&self) -> &str {
            &self.timezone
        }

        /// Query string pairs in the order they are sent.
        pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
            let hourly = self
                .variables
                .iter()
                .map(|v| v.api_name())
                .collect::<Vec<_>>()
                .join(",");

            let mut pairs = vec![
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("hourly", hourly),
                ("timezone", self.timezone.clone()),
            ];
            if let Some(range) = self.range {
                pairs.push(("start_date", range.start.format("%Y-%m-%d").to_string()));
                pairs.push(("end_date", range.end.format("%Y-%m-%d").to_string()));
            }
            pairs
        }

        /// Full request URL against `base`.
        pub fn url(&self, base: &str) -> Result<Url, url::ParseError> {
            Url::parse_with_params(base, self.query_pairs())
        }
    }

}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error{}: {detail}", status_suffix(.status))]
    Network { status: Option<u16>, detail: String },

    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network {
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Body of a provider error response.
#[derive(Deserialize, Debug)]
struct ProviderError {
    reason: String,
}

pub struct Client {
    http: HttpClient,
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Issues one request and decodes the body. There is no retry.
    pub fn fetch_payload(&self, params: &QueryParameters) -> Result<Value, FetchError> {
        let url = params
            .url(&self.config.base_url)
            .map_err(|err| FetchError::Network {
                status: None,
                detail: format!("invalid base url `{}`: {err}", self.config.base_url),
            })?;
        let response = get_web_json(&self.http, url)?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let detail = provider_reason(&body);
            warn!(status = status.as_u16(), %detail, "provider rejected the request");
            return Err(FetchError::Network {
                status: Some(status.as_u16()),
                detail,
            });
        }

        debug!(bytes = body.len(), "received payload");
        serde_json::from_str(&body).map_err(|err| FetchError::InvalidResponse {
            detail: format!("body is not valid JSON: {err}"),
        })
    }

    /// Fetches and normalizes the requested variables into a [`Table`].
    pub fn fetch(&self, params: &QueryParameters) -> Result<Table, crate::Error> {
        let payload = self.fetch_payload(params)?;
        let table = normalize(&payload, params.variables())?;
        info!(rows = table.len(), columns = table.columns().len(), "normalized payload");
        Ok(table)
    }
}

fn provider_reason(body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(err) => err.reason,
        Err(_) => body.chars().take(ERROR_SNIPPET_LEN).collect(),
    }
}

fn get_web_json(client: &HttpClient, url: Url) -> Result<Response, reqwest::Error> {
    info!(%url, "requesting hourly forecast");
    client.get(url).header(ACCEPT, "application/json").send()
}
