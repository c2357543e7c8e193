use crate::config::ConfigError;
use hyper::StatusCode;

/// Why a single badge request could not be answered.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum CiStatusError {
    #[error("workflow not found")]
    WorkflowNotFound,

    /// Anything that went wrong talking to the CI provider. Carries the
    /// provider's message unchanged.
    #[error("{0}")]
    Upstream(String),

    #[error("user not allowed")]
    UserNotAllowed,

    /// A path parameter that does not percent-decode to UTF-8.
    #[error("invalid path segment: {0}")]
    InvalidPathSegment(String),
}

impl CiStatusError {
    // Every failure is reported as a bad request; badge consumers only
    // distinguish success from failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CiStatusError::WorkflowNotFound => StatusCode::BAD_REQUEST,
            CiStatusError::Upstream(_) => StatusCode::BAD_REQUEST,
            CiStatusError::UserNotAllowed => StatusCode::BAD_REQUEST,
            CiStatusError::InvalidPathSegment(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short tag used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CiStatusError::WorkflowNotFound => "workflow_not_found",
            CiStatusError::Upstream(_) => "upstream_error",
            CiStatusError::UserNotAllowed => "user_not_allowed",
            CiStatusError::InvalidPathSegment(_) => "invalid_path_segment",
        }
    }
}

impl From<reqwest::Error> for CiStatusError {
    fn from(e: reqwest::Error) -> Self {
        CiStatusError::Upstream(e.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
