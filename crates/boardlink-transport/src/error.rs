use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Establishing an outbound connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The outbound connection was not established in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A line handed to `send_line` contained a line terminator, or an
    /// incoming line exceeded the size limit.
    #[error("invalid line: {0}")]
    InvalidLine(String),

    /// An incoming line was not valid UTF-8. The line has been consumed
    /// and the connection is still usable.
    #[error("malformed line: {0}")]
    MalformedLine(String),
}

impl TransportError {
    /// Returns `true` if only the current line was bad and reading can
    /// carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedLine(_))
    }
}
