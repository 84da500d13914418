use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use jetstream_client::{Client, ClientEvent, TransportStatus, CLOSE_CODE_CONNECTION_DENIED};
use jetstream_shared::{FragmentKind, Message, ModelObject, PropertyValue, SyncFragment};
use jetstream_test::{
    attach_scope, establish_session, test_registry, test_scope, MockChannel, MockChannelHandle,
};

const RETRY_WAIT: Duration = Duration::from_millis(120);

/// Pumps the client across the reconnect retry cadence until the channel
/// reopens.
fn pump_through_reconnect(client: &mut Client) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    for _ in 0..4 {
        events.extend(client.receive());
        if client.status() == TransportStatus::Connected {
            break;
        }
        std::thread::sleep(RETRY_WAIT);
    }
    events
}

fn setup_attached() -> (Client, MockChannelHandle) {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    establish_session(&mut client, &handle, "t");
    attach_scope(&mut client, &handle, test_scope("S"), 1);
    (client, handle)
}

#[test]
fn unacked_messages_resend_after_reconnect() {
    let (mut client, handle) = setup_attached();

    // make a local edit; the resulting ScopeSync goes unacknowledged
    let registry = test_registry();
    let scope = client.scope_mut(1).unwrap();
    let canvas = ModelObject::new(registry.get("Canvas").unwrap());
    scope.attach_root(canvas).unwrap();
    client.receive();
    let sent = handle.take_sent();
    let unacked: Vec<&Message> = sent
        .iter()
        .filter(|message| matches!(message, Message::ScopeSync { .. }))
        .collect();
    assert_eq!(unacked.len(), 1);
    let lost_sync = unacked[0].clone();

    // drop the connection before any ack, then reconnect
    handle.server_close(None);
    client.receive();
    pump_through_reconnect(&mut client);
    assert_eq!(client.status(), TransportStatus::Connected);
    handle.take_sent();

    // the server acks everything before the sync and asks for a resend
    handle.deliver(&Message::Ping {
        index: 7,
        ack: lost_sync.index() - 1,
        resend_missing: true,
    });
    client.receive();

    let resent = handle.take_sent();
    assert!(resent.contains(&lost_sync));
}

#[test]
fn acked_messages_are_never_resent() {
    let (mut client, handle) = setup_attached();

    let registry = test_registry();
    let scope = client.scope_mut(1).unwrap();
    let canvas = ModelObject::new(registry.get("Canvas").unwrap());
    scope.attach_root(canvas).unwrap();
    client.receive();
    let highest = handle
        .take_sent()
        .iter()
        .map(Message::index)
        .max()
        .unwrap();

    // everything is acknowledged; a resend request finds an empty buffer
    handle.deliver(&Message::Ping {
        index: 8,
        ack: highest,
        resend_missing: true,
    });
    client.receive();
    assert_eq!(handle.take_sent(), Vec::new());
}

#[test]
fn reconnect_advertises_the_session_and_resumes() {
    let (mut client, handle) = setup_attached();

    handle.server_close(None);
    client.receive();
    pump_through_reconnect(&mut client);

    assert_eq!(handle.last_connect_token(), Some("t".to_string()));
    let sent = handle.take_sent();
    assert!(sent.iter().any(|message| matches!(
        message,
        Message::Ping {
            resend_missing: true,
            ..
        }
    )));
}

#[test]
fn fatal_close_code_suppresses_reconnects() {
    let (mut client, handle) = setup_attached();
    let connects_before = handle.connect_count();

    handle.server_close(Some(CLOSE_CODE_CONNECTION_DENIED));
    let events = client.receive();
    assert!(events.contains(&ClientEvent::StatusChanged {
        status: TransportStatus::Fatal
    }));

    std::thread::sleep(RETRY_WAIT);
    client.receive();
    assert_eq!(handle.connect_count(), connects_before);

    // a fatal transport refuses to come back
    client.connect().unwrap();
    client.receive();
    assert_eq!(handle.connect_count(), connects_before);
    assert_eq!(client.status(), TransportStatus::Fatal);
}

#[test]
fn repeated_connection_failures_turn_fatal() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    handle.set_auto_open(false);

    client.connect().unwrap();
    for _ in 0..24 {
        client.receive();
        if client.status() == TransportStatus::Fatal {
            break;
        }
        std::thread::sleep(RETRY_WAIT);
    }
    assert_eq!(client.status(), TransportStatus::Fatal);
}

#[test]
fn unreachable_network_keeps_retrying_without_turning_fatal() {
    let (mut client, handle) = setup_attached();

    handle.set_reachable(false);
    handle.server_close(None);
    client.receive();

    for _ in 0..4 {
        std::thread::sleep(RETRY_WAIT);
        client.receive();
    }
    // no dial attempts while unreachable, and no fatal escalation
    assert_ne!(client.status(), TransportStatus::Fatal);
    let connects_before = handle.connect_count();

    handle.set_reachable(true);
    pump_through_reconnect(&mut client);
    assert!(handle.connect_count() > connects_before);
    assert_eq!(client.status(), TransportStatus::Connected);
}

#[test]
fn malformed_payloads_are_dropped_and_the_connection_survives() {
    let (mut client, handle) = setup_attached();

    handle.deliver_raw("this is not json");
    handle.deliver_raw("42");
    let shape_uuid = Uuid::new_v4();
    handle.deliver(&Message::ScopeSync {
        index: 9,
        scope_index: 1,
        sync_fragments: vec![SyncFragment {
            kind: FragmentKind::Add,
            uuid: shape_uuid,
            cls: Some("Shape".to_string()),
            properties: Some([("x".to_string(), json!(4))].into_iter().collect()),
        }],
    });
    client.receive();

    assert_eq!(client.status(), TransportStatus::Connected);
    assert_eq!(
        client.scope(1).unwrap().get(&shape_uuid).unwrap().value("x"),
        Some(&PropertyValue::Int(4))
    );
}
