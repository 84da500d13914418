use thiserror::Error;

/// Server close code for a permanently refused connection.
pub const CLOSE_CODE_CONNECTION_DENIED: u16 = 4096;
/// Server close code for a permanently terminated connection.
pub const CLOSE_CODE_CONNECTION_CLOSED: u16 = 4097;

/// Whether a close code signals a fatal, non-recoverable failure. Fatal
/// codes suppress reconnects and dead-end the transport.
pub fn is_fatal_close_code(code: u16) -> bool {
    code == CLOSE_CODE_CONNECTION_DENIED || code == CLOSE_CODE_CONNECTION_CLOSED
}

/// Errors that can occur sending over a message channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Attempted to send while the underlying pipe is not open
    #[error("Channel is not open")]
    NotOpen,

    /// The underlying pipe rejected the payload
    #[error("Channel send failed: {reason}")]
    SendFailed { reason: String },
}

/// Lifecycle and traffic events drained from a message channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Closed { code: Option<u16> },
    Message(String),
    Error(String),
}

/// The opaque in-order bidirectional message pipe the transport sits on:
/// a WebSocket in production, a scripted mock in tests.
///
/// Implementations may receive bytes on an internal worker, but `poll` is
/// only ever called from the app thread, so events surface there.
pub trait MessageChannel {
    /// Opens the pipe. On reconnects `session_token` carries the current
    /// session identity, surfaced as the `X-Jetstream-SessionToken` header
    /// or an equivalent out-of-band mechanism.
    fn connect(&mut self, session_token: Option<&str>);

    fn disconnect(&mut self);

    /// Sends one UTF-8 JSON payload.
    fn send(&mut self, payload: &str) -> Result<(), ChannelError>;

    /// Drains one queued event, if any.
    fn poll(&mut self) -> Option<ChannelEvent>;

    /// Reachability probe consulted by the reconnect loop.
    fn is_reachable(&self) -> bool {
        true
    }
}
