// ⚠️ Source Errors
// Typed failures for the open-data collectors
//
// Callers must be able to tell "no data" from "source unreachable" from
// "data malformed", so every collector operation returns SourceResult.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Network unreachable, DNS failure, or a non-2xx status other than 404
    #[error("transport error for {url}: {detail}")]
    Transport { url: String, detail: String },

    /// Request exceeded the configured timeout
    #[error("request timed out: {url}")]
    Timeout { url: String },

    /// Valid request, upstream has no data for the key
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Malformed JSON or CSV body
    #[error("parse error: {detail}")]
    Parse { detail: String },

    /// Caller-supplied key cannot be sent upstream (e.g. a code with path characters)
    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// CSV headers do not match any known alias set
    #[error("unrecognized roster headers, missing columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    pub fn transport(url: &str, detail: impl ToString) -> Self {
        SourceError::Transport {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn parse(detail: impl ToString) -> Self {
        SourceError::Parse {
            detail: detail.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }

    /// Transient failures worth retrying later; everything else is permanent
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Transport { .. } | SourceError::Timeout { .. } | SourceError::Io(_)
        )
    }

    /// Short machine-friendly label, used in manifests and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } => "transport",
            SourceError::Timeout { .. } => "timeout",
            SourceError::NotFound { .. } => "not_found",
            SourceError::Parse { .. } => "parse",
            SourceError::InvalidRequest { .. } => "invalid_request",
            SourceError::Schema { .. } => "schema",
            SourceError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::parse(e)
    }
}

impl From<csv::Error> for SourceError {
    fn from(e: csv::Error) -> Self {
        SourceError::parse(e)
    }
}
