use thiserror::Error;

/// Errors that can occur during message framing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The transport payload is not a JSON object or array
    #[error("Malformed message payload: {reason}")]
    MalformedPayload { reason: String },

    /// A message failed to serialize
    #[error("Failed to encode {message_type} message: {reason}")]
    EncodeFailed {
        message_type: &'static str,
        reason: String,
    },
}
