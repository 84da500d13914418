use thiserror::Error;

use jetstream_shared::MessageError;

use super::channel::ChannelError;
use super::TransportStatus;

/// Errors that can occur sending through the transport adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Attempted to send while not connected
    #[error("Transport is not connected (status: {status:?})")]
    NotConnected { status: TransportStatus },

    /// The underlying channel failed
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The outbound message failed to serialize
    #[error(transparent)]
    Encode(#[from] MessageError),
}
