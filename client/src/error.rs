use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur on user-initiated client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The client was closed and refuses further operations
    #[error("Client has been closed")]
    Closed,

    /// The operation requires an established session
    #[error("No session has been established")]
    NoSession,

    /// The transport could not carry the message
    #[error(transparent)]
    Transport(#[from] TransportError),
}
