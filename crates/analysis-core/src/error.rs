use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Every provider credential is cooling or burnt.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider returned bad data: {0}")]
    ProviderBadData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl AnalysisError {
    /// Transient failures are retried by the job runtime; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Transient(_) | AnalysisError::CacheError(_))
    }
}
