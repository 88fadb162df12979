// src/error.rs
//! Error taxonomy shared by every digest source.

/// Failure modes of a single digest cycle.
///
/// `Fetch` and `DataIntegrity` are recoverable per source: the orchestrator logs
/// them and moves on to the next source. `Configuration` marks a wiring defect and
/// is raised at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DigestError {
    /// Upstream unreachable, timed out, answered non-2xx, or returned a malformed body.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Upstream answered, but the payload breaks a data-model invariant.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// A source was used without the configuration it needs.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DigestError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::DataIntegrity(_) => "integrity",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<reqwest::Error> for DigestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Fetch(format!("timed out: {e}"))
        } else {
            Self::Fetch(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DigestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Fetch(format!("malformed response: {e}"))
    }
}

pub type DigestResult<T> = Result<T, DigestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_a_fetch_error() {
        let err: DigestError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("malformed response"));
    }
}
