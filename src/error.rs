use thiserror::Error;

/// Failure classes the engine distinguishes when deciding how far an error
/// may propagate. Only a store-wide `DataSourceUnavailable` aborts a scan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("data source unavailable: {0}")]
    DataSourceUnavailable(String),
    #[error("hazard provider unavailable for {location}: {reason}")]
    HazardProviderUnavailable { location: String, reason: String },
    #[error("dispatch through {channel} failed: {reason}")]
    DispatchFailure { channel: String, reason: String },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid shipment transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl EngineError {
    pub fn data_source(error: impl std::fmt::Display) -> Self {
        Self::DataSourceUnavailable(error.to_string())
    }

    pub fn hazard(location: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::HazardProviderUnavailable {
            location: location.into(),
            reason: error.to_string(),
        }
    }

    pub fn dispatch(channel: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::DispatchFailure {
            channel: channel.into(),
            reason: error.to_string(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(error: rusqlite::Error) -> Self {
        Self::data_source(error)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        Self::data_source(error)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
