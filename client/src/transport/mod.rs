mod channel;
mod error;

pub use channel::{
    is_fatal_close_code, ChannelError, ChannelEvent, MessageChannel,
    CLOSE_CODE_CONNECTION_CLOSED, CLOSE_CODE_CONNECTION_DENIED,
};
pub use error::TransportError;

use std::collections::HashSet;
use std::time::Duration;

use log::{info, trace, warn};

use jetstream_shared::{decode_payload, encode_message, Message};

use crate::timer::Timer;

const PING_INTERVAL: Duration = Duration::from_secs(10);
const PING_JITTER: Duration = Duration::from_secs(1);
const RECONNECT_RETRY: Duration = Duration::from_millis(100);
/// Consecutive connection failures tolerated before the transport is
/// considered unable to make progress.
const MAX_CONSECUTIVE_FAILURES: u32 = 8;

/// Connection status of the transport adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Closed,
    Connecting,
    Connected,
    /// A fatal close code was received; reconnects are suppressed.
    Fatal,
}

/// Events surfaced to the client pump.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StatusChanged { status: TransportStatus },
    /// Inbound message with no pending reply correlation.
    Message(Message),
    /// Correlated reply. Fired at most once per registered index; duplicate
    /// replies are dropped.
    Reply { reply_to: u64, message: Message },
}

/// Connection lifecycle, reply correlation, and the non-acked resend buffer
/// on top of a pluggable [`MessageChannel`].
pub struct Transport {
    channel: Box<dyn MessageChannel>,
    status: TransportStatus,
    /// Outbound indices awaiting a reply.
    waiting_reply: HashSet<u64>,
    /// Non-ping messages sent while a session exists, kept until the server
    /// acks their index. Append order is index order.
    non_acked: Vec<Message>,
    session_token: Option<String>,
    ping_timer: Timer,
    reconnect_timer: Timer,
    reconnect_pending: bool,
    user_disconnected: bool,
    consecutive_failures: u32,
    events: Vec<TransportEvent>,
}

impl Transport {
    pub fn new(channel: Box<dyn MessageChannel>) -> Self {
        Self {
            channel,
            status: TransportStatus::Closed,
            waiting_reply: HashSet::new(),
            non_acked: Vec::new(),
            session_token: None,
            ping_timer: Timer::with_jitter(PING_INTERVAL, PING_JITTER),
            reconnect_timer: Timer::new(RECONNECT_RETRY),
            reconnect_pending: false,
            user_disconnected: false,
            consecutive_failures: 0,
            events: Vec::new(),
        }
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == TransportStatus::Connected
    }

    /// Once a session exists its token travels with every reconnect and
    /// enables non-acked buffering.
    pub fn set_session_token(&mut self, token: &str) {
        self.session_token = Some(token.to_string());
    }

    // Lifecycle

    pub fn connect(&mut self) {
        if self.status == TransportStatus::Fatal {
            warn!("Ignoring connect on a fatal transport");
            return;
        }
        self.user_disconnected = false;
        self.set_status(TransportStatus::Connecting);
        self.channel.connect(self.session_token.as_deref());
    }

    /// User-initiated disconnect: no reconnect loop, outstanding replies are
    /// dropped.
    pub fn disconnect(&mut self) {
        self.user_disconnected = true;
        self.reconnect_pending = false;
        self.waiting_reply.clear();
        self.channel.disconnect();
        self.set_status(TransportStatus::Closed);
    }

    pub fn reconnect(&mut self) {
        if self.status == TransportStatus::Fatal {
            warn!("Ignoring reconnect on a fatal transport");
            return;
        }
        self.channel.disconnect();
        self.connect();
    }

    // Sending

    /// Encodes and sends one message. Non-ping messages sent while a session
    /// exists are buffered until the server acks their index, so the buffer
    /// survives a send that dies mid-flight.
    pub fn send_message(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.status != TransportStatus::Connected {
            return Err(TransportError::NotConnected {
                status: self.status,
            });
        }
        let payload = encode_message(message)?;
        if !message.is_ping() && self.session_token.is_some() {
            self.non_acked.push(message.clone());
        }
        self.channel.send(&payload)?;
        Ok(())
    }

    /// Sends a message whose index expects a correlated reply.
    pub fn send_message_expecting_reply(&mut self, message: &Message) -> Result<(), TransportError> {
        self.send_message(message)?;
        self.waiting_reply.insert(message.index());
        Ok(())
    }

    /// Whether the keep-alive ping is due. The cadence is a jittered fixed
    /// interval; sends and receives do not reset it.
    pub fn keepalive_due(&mut self) -> bool {
        if self.status == TransportStatus::Connected
            && self.session_token.is_some()
            && self.ping_timer.ringing()
        {
            self.ping_timer.reset();
            return true;
        }
        false
    }

    pub fn non_acked_count(&self) -> usize {
        self.non_acked.len()
    }

    // Pump

    /// Drains the channel, runs the reconnect cadence, and returns the
    /// events for the client to route.
    pub fn process(&mut self) -> Vec<TransportEvent> {
        while let Some(event) = self.channel.poll() {
            match event {
                ChannelEvent::Opened => {
                    self.consecutive_failures = 0;
                    self.reconnect_pending = false;
                    self.ping_timer.reset();
                    self.set_status(TransportStatus::Connected);
                }
                ChannelEvent::Closed { code } => self.handle_closed(code),
                ChannelEvent::Error(reason) => {
                    warn!("Channel error: {}", reason);
                }
                ChannelEvent::Message(payload) => self.handle_payload(&payload),
            }
        }

        if self.reconnect_pending
            && self.status != TransportStatus::Fatal
            && self.reconnect_timer.ringing()
        {
            self.reconnect_timer.reset();
            if self.channel.is_reachable() {
                self.set_status(TransportStatus::Connecting);
                self.channel.connect(self.session_token.as_deref());
            }
        }

        std::mem::take(&mut self.events)
    }

    fn handle_closed(&mut self, code: Option<u16>) {
        self.ping_timer.reset();

        if let Some(code) = code {
            if is_fatal_close_code(code) {
                warn!("Channel closed with fatal code {}", code);
                self.reconnect_pending = false;
                self.set_status(TransportStatus::Fatal);
                return;
            }
        }
        if self.user_disconnected {
            self.set_status(TransportStatus::Closed);
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            warn!(
                "No connection progress after {} attempts, giving up",
                self.consecutive_failures
            );
            self.reconnect_pending = false;
            self.set_status(TransportStatus::Fatal);
            return;
        }

        let next = if self.status == TransportStatus::Connecting {
            TransportStatus::Closed
        } else {
            TransportStatus::Connecting
        };
        self.set_status(next);
        self.reconnect_pending = true;
        self.reconnect_timer.reset();
    }

    fn handle_payload(&mut self, payload: &str) {
        let messages = match decode_payload(payload) {
            Ok(messages) => messages,
            Err(err) => {
                warn!("Dropping inbound payload: {}", err);
                return;
            }
        };
        for message in messages {
            if let Message::Ping {
                ack,
                resend_missing,
                ..
            } = &message
            {
                self.prune_acked(*ack);
                if *resend_missing {
                    self.resend_non_acked();
                }
            }

            if let Some(reply_to) = message.reply_to() {
                if self.waiting_reply.remove(&reply_to) {
                    self.events.push(TransportEvent::Reply { reply_to, message });
                } else {
                    trace!("Dropping duplicate or unsolicited reply to {}", reply_to);
                }
                continue;
            }
            self.events.push(TransportEvent::Message(message));
        }
    }

    /// Drops every buffered message the server has acknowledged.
    fn prune_acked(&mut self, ack: u64) {
        self.non_acked.retain(|message| message.index() > ack);
    }

    /// Re-transmits the remaining buffer in index order.
    fn resend_non_acked(&mut self) {
        if self.non_acked.is_empty() {
            return;
        }
        info!("Resending {} unacknowledged messages", self.non_acked.len());
        let messages = self.non_acked.clone();
        for message in &messages {
            let payload = match encode_message(message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("Skipping resend of message {}: {}", message.index(), err);
                    continue;
                }
            };
            if let Err(err) = self.channel.send(&payload) {
                warn!("Resend stopped at message {}: {}", message.index(), err);
                break;
            }
        }
    }

    fn set_status(&mut self, status: TransportStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.events.push(TransportEvent::StatusChanged { status });
    }
}
