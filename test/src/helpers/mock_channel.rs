use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use jetstream_client::{ChannelError, ChannelEvent, MessageChannel};
use jetstream_shared::{decode_payload, encode_message, Message};

struct MockChannelState {
    connected: bool,
    reachable: bool,
    auto_open: bool,
    fail_sends: bool,
    pending: VecDeque<ChannelEvent>,
    sent: Vec<String>,
    connect_tokens: Vec<Option<String>>,
}

/// Scripted in-memory [`MessageChannel`]: the test side pushes inbound
/// events through the handle and inspects what the client sent.
pub struct MockChannel {
    state: Rc<RefCell<MockChannelState>>,
}

#[derive(Clone)]
pub struct MockChannelHandle {
    state: Rc<RefCell<MockChannelState>>,
}

impl MockChannel {
    pub fn create() -> (Box<dyn MessageChannel>, MockChannelHandle) {
        let state = Rc::new(RefCell::new(MockChannelState {
            connected: false,
            reachable: true,
            auto_open: true,
            fail_sends: false,
            pending: VecDeque::new(),
            sent: Vec::new(),
            connect_tokens: Vec::new(),
        }));
        let handle = MockChannelHandle {
            state: Rc::clone(&state),
        };
        (Box::new(MockChannel { state }), handle)
    }
}

impl MessageChannel for MockChannel {
    fn connect(&mut self, session_token: Option<&str>) {
        let mut state = self.state.borrow_mut();
        state
            .connect_tokens
            .push(session_token.map(|token| token.to_string()));
        if state.auto_open && state.reachable {
            state.connected = true;
            state.pending.push_back(ChannelEvent::Opened);
        } else {
            state.pending.push_back(ChannelEvent::Closed { code: None });
        }
    }

    fn disconnect(&mut self) {
        self.state.borrow_mut().connected = false;
    }

    fn send(&mut self, payload: &str) -> Result<(), ChannelError> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(ChannelError::NotOpen);
        }
        if state.fail_sends {
            return Err(ChannelError::SendFailed {
                reason: "scripted failure".to_string(),
            });
        }
        state.sent.push(payload.to_string());
        Ok(())
    }

    fn poll(&mut self) -> Option<ChannelEvent> {
        self.state.borrow_mut().pending.pop_front()
    }

    fn is_reachable(&self) -> bool {
        self.state.borrow().reachable
    }
}

impl MockChannelHandle {
    /// Queues a server message for the client's next pump.
    pub fn deliver(&self, message: &Message) {
        let payload = encode_message(message).expect("test message must encode");
        self.deliver_raw(&payload);
    }

    pub fn deliver_raw(&self, payload: &str) {
        self.state
            .borrow_mut()
            .pending
            .push_back(ChannelEvent::Message(payload.to_string()));
    }

    /// Simulates the server closing the pipe.
    pub fn server_close(&self, code: Option<u16>) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.pending.push_back(ChannelEvent::Closed { code });
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().reachable = reachable;
    }

    pub fn set_auto_open(&self, auto_open: bool) {
        self.state.borrow_mut().auto_open = auto_open;
    }

    pub fn set_fail_sends(&self, fail_sends: bool) {
        self.state.borrow_mut().fail_sends = fail_sends;
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn connect_count(&self) -> usize {
        self.state.borrow().connect_tokens.len()
    }

    pub fn last_connect_token(&self) -> Option<String> {
        self.state
            .borrow()
            .connect_tokens
            .last()
            .cloned()
            .flatten()
    }

    pub fn sent_count(&self) -> usize {
        self.state.borrow().sent.len()
    }

    /// Decodes every payload the client sent so far, in send order.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.state
            .borrow()
            .sent
            .iter()
            .flat_map(|payload| decode_payload(payload).expect("client payload must decode"))
            .collect()
    }

    /// Decodes and clears the sent buffer.
    pub fn take_sent(&self) -> Vec<Message> {
        let messages = self.sent_messages();
        self.state.borrow_mut().sent.clear();
        messages
    }
}
