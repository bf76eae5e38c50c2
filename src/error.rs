//! Error types for the manager client

use thiserror::Error;

/// Result type alias using [`AmiError`].
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors produced by the manager client.
///
/// Connection-wide failures (`Io`, `ConnectTimeout`, `HandshakeTimeout`,
/// `AuthenticationFailed`, `ProtocolError` on the receive path) are also pushed to the state observer.
/// Per-call failures (`Timeout`, `ActionFailed`, `OriginateFailed`,
/// `OriginateTimeout`) are only returned to the caller that hit them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AmiError {
    /// Dial, read or write failure on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP connect did not complete in time.
    #[error("connect timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// The server stopped answering during the greeting or login.
    #[error("handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    /// Login rejected by the server.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// No response within the caller's timeout. The connection is unaffected.
    #[error("timed out after {timeout_ms}ms waiting for response")]
    Timeout { timeout_ms: u64 },

    /// Malformed wire data or an action that cannot be serialized.
    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    /// The connection went away before the response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The client has been closed.
    #[error("client is not running")]
    NotRunning,

    /// `start()` called while not stopped.
    #[error("client already started")]
    AlreadyRunning,

    /// The server answered `Response: Error`.
    #[error("action failed: {message}")]
    ActionFailed { message: String },

    /// The server rejected an originate.
    #[error("originate failed: {message}")]
    OriginateFailed { message: String },

    /// No originate response within the timeout.
    #[error("originate timed out after {timeout_ms}ms")]
    OriginateTimeout { timeout_ms: u64 },

    /// Global event stream overflowed; one or more events were dropped.
    #[error("event queue full, events dropped")]
    QueueFull,

    /// Rejected configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl AmiError {
    pub(crate) fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    pub(crate) fn auth_failed(message: impl Into<String>) -> Self {
        AmiError::AuthenticationFailed {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        AmiError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error tore down (or prevented) the connection.
    ///
    /// A state observer can use this to decide whether a reconnect is worth
    /// attempting; authentication failures are excluded since retrying with
    /// the same credentials will fail again.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AmiError::Io(_)
                | AmiError::ConnectTimeout { .. }
                | AmiError::HandshakeTimeout { .. }
                | AmiError::ConnectionClosed
                | AmiError::ProtocolError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            AmiError::Timeout { timeout_ms: 250 }.to_string(),
            "timed out after 250ms waiting for response"
        );
        assert_eq!(
            AmiError::auth_failed("Authentication failed").to_string(),
            "authentication failed: Authentication failed"
        );
        assert_eq!(AmiError::NotRunning.to_string(), "client is not running");
    }

    #[test]
    fn io_converts_and_classifies() {
        let err: AmiError = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        assert!(err.is_connection_error());
        assert!(!AmiError::auth_failed("no").is_connection_error());
        assert!(!AmiError::Timeout { timeout_ms: 1 }.is_connection_error());
        assert!(AmiError::HandshakeTimeout { timeout_ms: 1 }.is_connection_error());
    }
}
