//! Fetch hourly weather from Open-Meteo, normalize it into a [`table::Table`]
//! and describe it as a [`chart::ChartArtifact`].
//!
//! The pipeline is strictly sequential:
//!
//! ```no_run
//! use wxplot::chart::{render, ChartSpec};
//! use wxplot::openmeteo::{Client, ClientConfig, QueryParameters, Variable};
//!
//! # fn main() -> Result<(), wxplot::Error> {
//! let params = QueryParameters::new(52.52, 13.41, [Variable::Temperature])?;
//! let table = Client::new(ClientConfig::default())?.fetch(&params)?;
//! let chart = render(&table, &ChartSpec::new(["temperature"]))?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod app;
pub mod chart;
pub mod cli;
pub mod openmeteo;
pub mod table;

pub use chart::{ChartArtifact, ChartSpec, RenderError};
pub use openmeteo::{Client, ClientConfig, FetchError, QueryError, QueryParameters, Variable};
pub use table::{NormalizationError, Table};

/// Failure of one pipeline stage. The stage's own error is kept intact.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizationError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}
