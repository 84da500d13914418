use std::collections::BTreeMap;

use serde_json::{json, Value};
use uuid::Uuid;

use jetstream_client::Client;
use jetstream_shared::{FragmentKind, Message, PropertyValue, SyncFragment};
use jetstream_test::{attach_scope, establish_session, test_scope, MockChannel};

fn props(entries: &[(&str, Value)]) -> Option<BTreeMap<String, Value>> {
    Some(
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    )
}

fn setup() -> (Client, jetstream_test::MockChannelHandle) {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    establish_session(&mut client, &handle, "t");
    attach_scope(&mut client, &handle, test_scope("S"), 1);
    (client, handle)
}

#[test]
fn scope_state_installs_root_and_objects() {
    let (mut client, handle) = setup();
    let root_uuid = Uuid::new_v4();
    let shape_uuid = Uuid::new_v4();

    handle.deliver(&Message::ScopeState {
        index: 3,
        scope_index: 1,
        root_fragment: SyncFragment {
            kind: FragmentKind::Root,
            uuid: root_uuid,
            cls: Some("Canvas".to_string()),
            properties: None,
        },
        sync_fragments: vec![SyncFragment {
            kind: FragmentKind::Add,
            uuid: shape_uuid,
            cls: Some("Shape".to_string()),
            properties: props(&[("color", json!(255)), ("x", json!(10))]),
        }],
    });
    client.receive();

    let scope = client.scope(1).unwrap();
    assert_eq!(scope.root_model().unwrap().uuid(), root_uuid);
    let shape = scope.get(&shape_uuid).unwrap();
    assert_eq!(shape.value("color"), Some(&PropertyValue::Color(255)));
    assert_eq!(shape.value("x"), Some(&PropertyValue::Int(10)));
}

#[test]
fn scope_state_for_unattached_scope_is_dropped() {
    let (mut client, handle) = setup();

    handle.deliver(&Message::ScopeState {
        index: 3,
        scope_index: 9,
        root_fragment: SyncFragment {
            kind: FragmentKind::Root,
            uuid: Uuid::new_v4(),
            cls: Some("Canvas".to_string()),
            properties: None,
        },
        sync_fragments: Vec::new(),
    });
    client.receive();

    assert!(client.scope(1).unwrap().root().is_none());
    assert!(client.scope(9).is_none());
}

#[test]
fn remote_sync_updates_existing_objects() {
    let (mut client, handle) = setup();
    let root_uuid = Uuid::new_v4();
    let shape_uuid = Uuid::new_v4();

    handle.deliver(&Message::ScopeState {
        index: 3,
        scope_index: 1,
        root_fragment: SyncFragment {
            kind: FragmentKind::Root,
            uuid: root_uuid,
            cls: Some("Canvas".to_string()),
            properties: props(&[("main", json!(shape_uuid.to_string()))]),
        },
        sync_fragments: vec![SyncFragment {
            kind: FragmentKind::Add,
            uuid: shape_uuid,
            cls: Some("Shape".to_string()),
            properties: props(&[("x", json!(10))]),
        }],
    });
    client.receive();

    handle.deliver(&Message::ScopeSync {
        index: 4,
        scope_index: 1,
        sync_fragments: vec![SyncFragment {
            kind: FragmentKind::Change,
            uuid: shape_uuid,
            cls: None,
            properties: props(&[("x", json!(31))]),
        }],
    });
    client.receive();

    let scope = client.scope(1).unwrap();
    assert_eq!(
        scope.get(&shape_uuid).unwrap().value("x"),
        Some(&PropertyValue::Int(31))
    );
    // the root's reference resolved against the scope
    assert_eq!(
        scope.root_model().unwrap().value("main"),
        Some(&PropertyValue::Ref(shape_uuid))
    );
}

#[test]
fn remote_apply_produces_no_outbound_fragments() {
    let (mut client, handle) = setup();
    let root_uuid = Uuid::new_v4();

    handle.take_sent();
    handle.deliver(&Message::ScopeState {
        index: 3,
        scope_index: 1,
        root_fragment: SyncFragment {
            kind: FragmentKind::Root,
            uuid: root_uuid,
            cls: Some("Canvas".to_string()),
            properties: props(&[("title", json!("board"))]),
        },
        sync_fragments: Vec::new(),
    });
    client.receive();
    client.receive();

    // nothing flushed back: applying inbound fragments never re-captures
    assert_eq!(handle.sent_count(), 0);
    assert!(!client.scope(1).unwrap().has_pending_changes());
}

#[test]
fn empty_scope_sync_is_ignored() {
    let (mut client, handle) = setup();
    handle.deliver(&Message::ScopeSync {
        index: 3,
        scope_index: 1,
        sync_fragments: Vec::new(),
    });
    client.receive();
    assert!(client.scope(1).unwrap().root().is_none());
    assert_eq!(handle.sent_count(), 0);
}
