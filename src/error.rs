//! Unified error handling for wintermute.
//!
//! Handler errors are caught per invocation and never tear down the
//! dispatch loop; session errors end a connection attempt and hand
//! control back to the supervisor.

use thiserror::Error;

/// Errors that can occur inside a plugin handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event content could not be processed due to encoding damage.
    /// The router retries the handler once with a sanitized event.
    #[error("text encoding problem: {0}")]
    Encoding(String),

    /// The command was invoked with unusable arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Anything else; logged and skipped.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Static error label for structured logging.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding",
            Self::Usage(_) => "usage",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type for plugin handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors that end a connection attempt or the process.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Resolving or connecting to the server failed. Fatal: the
    /// process reports and exits non-zero rather than retrying.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Configured server host.
        host: String,
        /// Configured server port.
        port: u16,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// A read or write on the established connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_util::codec::LinesCodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_codes_are_stable() {
        assert_eq!(HandlerError::Encoding("x".into()).error_code(), "encoding");
        assert_eq!(HandlerError::Usage("poll <secs>").error_code(), "usage");
        assert_eq!(
            HandlerError::Internal("x".into()).error_code(),
            "internal_error"
        );
    }
}
