use crate::transport::TransportStatus;

/// Events returned from the client pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    StatusChanged { status: TransportStatus },
    /// A session was established with the returned token.
    SessionAccepted { token: String },
    /// The server refused the session. Fired at most once; the client does
    /// not retry automatically.
    SessionDenied,
    /// A fetched scope was attached at the returned scope index.
    ScopeAttached { scope_index: u32 },
}
