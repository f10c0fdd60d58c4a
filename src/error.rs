use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed period: {0}")]
    MalformedPeriod(String),

    #[error("No manual data entered for {kpi_name} in {period}")]
    NoInputData { kpi_name: String, period: String },

    #[error("Data access failure: {0}")]
    DataAccess(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Unknown KPI: {0}")]
    UnknownKpi(String),

    #[error("Unknown field '{field}' for KPI {kpi_name}")]
    UnknownField { kpi_name: String, field: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::DataAccess(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::DataAccess(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
