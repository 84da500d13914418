//! # Jetstream Client
//! Session, transport & client state machine for the Jetstream
//! model-synchronization protocol.

mod client;
mod error;
mod events;
mod session;
mod timer;

pub mod transport;

pub use client::{Client, FetchCallback, FetchError};
pub use error::ClientError;
pub use events::ClientEvent;
pub use session::Session;
pub use timer::Timer;
pub use transport::{
    is_fatal_close_code, ChannelError, ChannelEvent, MessageChannel, Transport, TransportError,
    TransportEvent, TransportStatus, CLOSE_CODE_CONNECTION_CLOSED, CLOSE_CODE_CONNECTION_DENIED,
};
