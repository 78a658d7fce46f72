use thiserror::Error;

/// Why a request was passed through without being rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("request has no uri")]
    MissingPath,

    #[error("request uri is empty")]
    EmptyPath,

    #[error("request uri is not a string (got {0})")]
    NotAString(&'static str),

    #[error("rewritten uri is invalid: {0}")]
    InvalidUri(String),

    #[error("invalid default document {name:?}: {reason}")]
    InvalidDefaultDocument { name: String, reason: &'static str },
}

impl RewriteError {
    /// Short label used in access logs.
    pub fn kind_str(&self) -> &'static str {
        match self {
            RewriteError::MissingPath => "missing_path",
            RewriteError::EmptyPath => "empty_path",
            RewriteError::NotAString(_) => "not_a_string",
            RewriteError::InvalidUri(_) => "invalid_uri",
            RewriteError::InvalidDefaultDocument { .. } => "invalid_default_document",
        }
    }
}

/// Failures of the Lambda@Edge event adapter. A bad `uri` is not one of them: that case
/// passes the request through.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("decode cloudfront event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cloudfront event has no records")]
    NoRecords,
}
