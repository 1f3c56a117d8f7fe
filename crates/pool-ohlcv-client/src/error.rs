use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No {what} returned for {subject}")]
    Empty { what: &'static str, subject: String },

    #[error("No pages requested")]
    NoPages,
}

impl ClientError {
    /// Connection failures, timeouts and non-2xx responses.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Api { .. })
    }

    /// A well-formed response that simply carried nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, ClientError::Empty { .. } | ClientError::NoPages)
    }
}

/// Log a failure the way the `Option`-returning operations report it:
/// empty results at warn, everything else at error.
pub(crate) fn report(err: &ClientError) {
    if err.is_empty() {
        warn!("{err}");
    } else if err.is_transport() {
        error!("Request failed: {err}");
    } else {
        error!("Unusable response: {err}");
    }
}
