use jetstream_client::{Client, ClientEvent};
use jetstream_shared::{Message, Scope};

use super::MockChannelHandle;

/// Connects the client and walks the handshake to an established session.
pub fn establish_session(
    client: &mut Client,
    handle: &MockChannelHandle,
    token: &str,
) -> Vec<ClientEvent> {
    client.connect().expect("client is open");
    let mut events = client.receive();

    let create_index = handle
        .sent_messages()
        .iter()
        .find_map(|message| match message {
            Message::SessionCreate { index, .. } => Some(*index),
            _ => None,
        })
        .expect("client sent SessionCreate");
    handle.deliver(&Message::SessionCreateResponse {
        index: 1,
        reply_to: create_index,
        success: true,
        session_token: Some(token.to_string()),
    });
    events.extend(client.receive());
    events
}

/// Runs a `ScopeFetch` round-trip and attaches the scope at `scope_index`.
pub fn attach_scope(
    client: &mut Client,
    handle: &MockChannelHandle,
    scope: Scope,
    scope_index: u32,
) -> Vec<ClientEvent> {
    handle.take_sent();
    client
        .fetch_scope(scope, serde_json::json!({}), |_| {})
        .expect("fetch sends");

    let fetch_index = handle
        .sent_messages()
        .iter()
        .find_map(|message| match message {
            Message::ScopeFetch { index, .. } => Some(*index),
            _ => None,
        })
        .expect("client sent ScopeFetch");
    handle.deliver(&Message::Reply {
        index: 2,
        reply_to: fetch_index,
        result: Some(true),
        scope_index: Some(scope_index),
        error: None,
    });
    let events = client.receive();
    handle.take_sent();
    events
}
