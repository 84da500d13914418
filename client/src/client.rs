use std::collections::HashMap;

use log::{info, trace, warn};
use serde_json::Value;
use thiserror::Error;

use jetstream_shared::{Message, Scope, PROTOCOL_VERSION};

use crate::error::ClientError;
use crate::events::ClientEvent;
use crate::session::Session;
use crate::transport::{MessageChannel, Transport, TransportEvent, TransportStatus};

/// Structured error delivered to a failed scope fetch callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Scope fetch failed ({code}): {message}")]
pub struct FetchError {
    pub code: i32,
    pub message: String,
}

pub type FetchCallback = Box<dyn FnOnce(Result<u32, FetchError>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Offline,
    Online,
}

struct PendingFetch {
    scope: Scope,
    callback: FetchCallback,
}

/// Top-level state machine coordinating session, transport and scopes.
///
/// The client is pumped from the app thread: each [`Client::receive`] call
/// drains the channel, routes inbound messages to their scopes, runs the
/// keep-alive cadence, flushes dirty scopes outward, and returns the events
/// produced along the way. One pump call is the coalescing tick boundary:
/// any number of property writes between two calls yields one `ScopeSync`.
pub struct Client {
    transport: Transport,
    session: Session,
    state: ClientState,
    scopes: HashMap<u32, Scope>,
    pending_fetches: HashMap<u64, PendingFetch>,
    /// Index of the outstanding `SessionCreate`, if any.
    session_create_index: Option<u64>,
    denied: bool,
    closed: bool,
}

impl Client {
    pub fn new(channel: Box<dyn MessageChannel>) -> Self {
        Self {
            transport: Transport::new(channel),
            session: Session::new(),
            state: ClientState::Offline,
            scopes: HashMap::new(),
            pending_fetches: HashMap::new(),
            session_create_index: None,
            denied: false,
            closed: false,
        }
    }

    pub fn status(&self) -> TransportStatus {
        self.transport.status()
    }

    pub fn is_online(&self) -> bool {
        self.state == ClientState::Online
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session.token()
    }

    pub fn scope(&self, scope_index: u32) -> Option<&Scope> {
        self.scopes.get(&scope_index)
    }

    pub fn scope_mut(&mut self, scope_index: u32) -> Option<&mut Scope> {
        self.scopes.get_mut(&scope_index)
    }

    // Lifecycle

    pub fn connect(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.transport.connect();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.state = ClientState::Offline;
        self.session_create_index = None;
    }

    /// Clean shutdown: flush what can still be sent, abandon in-flight reply
    /// callbacks silently, disconnect, and refuse further operations.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.flush_scopes();
        self.pending_fetches.clear();
        self.session_create_index = None;
        self.transport.disconnect();
        self.state = ClientState::Offline;
        self.closed = true;
    }

    // Scope attachment

    /// Sends a `ScopeFetch` for the scope's name. On a successful reply the
    /// scope is attached at the returned scope index and its flushes start
    /// forwarding as `ScopeSync` messages; on failure the callback receives
    /// the server's structured error.
    pub fn fetch_scope<F>(
        &mut self,
        scope: Scope,
        params: Value,
        callback: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(Result<u32, FetchError>) + 'static,
    {
        self.ensure_open()?;
        if !self.session.is_established() {
            return Err(ClientError::NoSession);
        }
        let index = self.session.next_index();
        let message = Message::ScopeFetch {
            index,
            name: scope.name().to_string(),
            params,
        };
        self.transport.send_message_expecting_reply(&message)?;
        self.pending_fetches.insert(
            index,
            PendingFetch {
                scope,
                callback: Box::new(callback),
            },
        );
        Ok(())
    }

    /// Sends a liveness ping acking the highest server index seen.
    pub fn send_ping(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        if !self.session.is_established() {
            return Err(ClientError::NoSession);
        }
        self.send_ping_message(false)
    }

    // Pump

    /// Drives the client one tick: drains the transport, routes messages,
    /// runs the keep-alive cadence, and flushes dirty scopes outward.
    pub fn receive(&mut self) -> Vec<ClientEvent> {
        if self.closed {
            return Vec::new();
        }
        let mut events = Vec::new();
        for transport_event in self.transport.process() {
            match transport_event {
                TransportEvent::StatusChanged { status } => {
                    self.handle_status(status, &mut events);
                }
                TransportEvent::Reply { reply_to, message } => {
                    self.handle_reply(reply_to, message, &mut events);
                }
                TransportEvent::Message(message) => self.handle_message(message),
            }
        }

        if self.transport.keepalive_due() {
            if let Err(err) = self.send_ping_message(false) {
                warn!("Failed to send keep-alive ping: {}", err);
            }
        }

        self.flush_scopes();
        events
    }

    fn handle_status(&mut self, status: TransportStatus, events: &mut Vec<ClientEvent>) {
        events.push(ClientEvent::StatusChanged { status });
        match status {
            TransportStatus::Connected => {
                self.state = ClientState::Online;
                if self.session.is_established() {
                    // resume: re-advertise the session and ask the server to
                    // resend whatever we missed
                    if let Err(err) = self.send_ping_message(true) {
                        warn!("Failed to send resume ping: {}", err);
                    }
                } else if !self.denied && self.session_create_index.is_none() {
                    self.send_session_create();
                }
            }
            _ => {
                self.state = ClientState::Offline;
                // a reply to an in-flight SessionCreate is not coming; a
                // fresh one goes out on the next connect
                self.session_create_index = None;
            }
        }
    }

    fn send_session_create(&mut self) {
        let index = self.session.next_index();
        let message = Message::SessionCreate {
            index,
            version: PROTOCOL_VERSION.to_string(),
        };
        match self.transport.send_message_expecting_reply(&message) {
            Ok(()) => self.session_create_index = Some(index),
            Err(err) => warn!("Failed to send SessionCreate: {}", err),
        }
    }

    fn handle_reply(&mut self, reply_to: u64, message: Message, events: &mut Vec<ClientEvent>) {
        self.session.note_server_index(message.index());

        if Some(reply_to) == self.session_create_index {
            self.session_create_index = None;
            self.handle_session_response(message, events);
            return;
        }
        if let Some(pending) = self.pending_fetches.remove(&reply_to) {
            self.handle_fetch_reply(pending, message, events);
            return;
        }
        trace!("Ignoring reply to {} with no pending operation", reply_to);
    }

    fn handle_session_response(&mut self, message: Message, events: &mut Vec<ClientEvent>) {
        let Message::SessionCreateResponse {
            success,
            session_token,
            ..
        } = message
        else {
            warn!(
                "Expected SessionCreateResponse, got {}",
                message.type_name()
            );
            return;
        };

        let token = match (success, session_token) {
            (true, Some(token)) => token,
            (true, None) => {
                warn!("SessionCreateResponse succeeded without a session token");
                return;
            }
            (false, _) => {
                if !self.denied {
                    self.denied = true;
                    events.push(ClientEvent::SessionDenied);
                }
                return;
            }
        };

        self.session.establish(token.clone());
        self.transport.set_session_token(&token);
        events.push(ClientEvent::SessionAccepted { token });
    }

    fn handle_fetch_reply(
        &mut self,
        pending: PendingFetch,
        message: Message,
        events: &mut Vec<ClientEvent>,
    ) {
        let Message::Reply {
            result,
            scope_index,
            error,
            ..
        } = message
        else {
            warn!("Expected Reply to scope fetch, got {}", message.type_name());
            (pending.callback)(Err(FetchError {
                code: 0,
                message: format!("unexpected {} reply", message.type_name()),
            }));
            return;
        };

        if result.unwrap_or(false) {
            if let Some(scope_index) = scope_index {
                self.scopes.insert(scope_index, pending.scope);
                events.push(ClientEvent::ScopeAttached { scope_index });
                (pending.callback)(Ok(scope_index));
                return;
            }
        }
        let fetch_error = error
            .map(|body| FetchError {
                code: body.code,
                message: body.message,
            })
            .unwrap_or_else(|| FetchError {
                code: 0,
                message: "scope fetch failed".to_string(),
            });
        (pending.callback)(Err(fetch_error));
    }

    fn handle_message(&mut self, message: Message) {
        self.session.note_server_index(message.index());
        match message {
            // ack bookkeeping already ran inside the transport
            Message::Ping { .. } => {}
            Message::ScopeState {
                scope_index,
                root_fragment,
                sync_fragments,
                ..
            } => {
                let Some(scope) = self.scopes.get_mut(&scope_index) else {
                    warn!("ScopeState for unattached scope index {}", scope_index);
                    return;
                };
                scope.apply_root_fragment(&root_fragment, &sync_fragments);
            }
            Message::ScopeSync {
                scope_index,
                sync_fragments,
                ..
            } => {
                if sync_fragments.is_empty() {
                    info!("Ignoring empty ScopeSync for scope index {}", scope_index);
                    return;
                }
                let Some(scope) = self.scopes.get_mut(&scope_index) else {
                    warn!("ScopeSync for unattached scope index {}", scope_index);
                    return;
                };
                scope.apply_sync_fragments(&sync_fragments);
            }
            // unmatched replies are a no-op at the top level
            Message::Reply { .. } => {}
            other => {
                warn!("Unexpected {} message from server", other.type_name());
            }
        }
    }

    /// Coalesced outbound path: every dirty attached scope flushes into one
    /// `ScopeSync` carrying the session's next index.
    fn flush_scopes(&mut self) {
        if !self.session.is_established() || !self.transport.is_connected() {
            return;
        }
        let mut dirty: Vec<u32> = self
            .scopes
            .iter()
            .filter(|(_, scope)| scope.has_pending_changes())
            .map(|(scope_index, _)| *scope_index)
            .collect();
        dirty.sort_unstable();

        for scope_index in dirty {
            let fragments = match self.scopes.get_mut(&scope_index) {
                Some(scope) => scope.flush_changes(),
                None => continue,
            };
            if fragments.is_empty() {
                continue;
            }
            let message = Message::ScopeSync {
                index: self.session.next_index(),
                scope_index,
                sync_fragments: fragments,
            };
            if let Err(err) = self.transport.send_message(&message) {
                warn!("Failed to send ScopeSync for scope {}: {}", scope_index, err);
            }
        }
    }

    fn send_ping_message(&mut self, resend_missing: bool) -> Result<(), ClientError> {
        let message = Message::Ping {
            index: self.session.next_index(),
            ack: self.session.server_index(),
            resend_missing,
        };
        self.transport.send_message(&message)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}
