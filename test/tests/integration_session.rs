use std::cell::RefCell;
use std::rc::Rc;

use jetstream_client::{Client, ClientEvent, ClientError, TransportStatus};
use jetstream_shared::{ErrorBody, Message, PROTOCOL_VERSION};
use jetstream_test::{establish_session, test_scope, MockChannel};

#[test]
fn happy_attach_walks_the_full_handshake() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);

    client.connect().unwrap();
    let events = client.receive();
    assert!(events.contains(&ClientEvent::StatusChanged {
        status: TransportStatus::Connected
    }));
    assert!(client.is_online());

    // SessionCreate goes out first, index 1, advertised version
    let sent = handle.take_sent();
    assert_eq!(
        sent,
        vec![Message::SessionCreate {
            index: 1,
            version: PROTOCOL_VERSION.to_string(),
        }]
    );

    handle.deliver(&Message::SessionCreateResponse {
        index: 1,
        reply_to: 1,
        success: true,
        session_token: Some("t".to_string()),
    });
    let events = client.receive();
    assert!(events.contains(&ClientEvent::SessionAccepted {
        token: "t".to_string()
    }));
    assert_eq!(client.session_token(), Some("t"));

    // fetch a scope named "S"; reply attaches it at scope index 1
    let fetch_result = Rc::new(RefCell::new(None));
    let fetch_result_out = Rc::clone(&fetch_result);
    client
        .fetch_scope(test_scope("S"), serde_json::json!({}), move |result| {
            *fetch_result_out.borrow_mut() = Some(result);
        })
        .unwrap();

    let sent = handle.take_sent();
    assert!(matches!(
        &sent[..],
        [Message::ScopeFetch { index: 2, name, .. }] if name == "S"
    ));

    handle.deliver(&Message::Reply {
        index: 2,
        reply_to: 2,
        result: Some(true),
        scope_index: Some(1),
        error: None,
    });
    let events = client.receive();
    assert!(events.contains(&ClientEvent::ScopeAttached { scope_index: 1 }));
    assert_eq!(*fetch_result.borrow(), Some(Ok(1)));
    assert!(client.scope(1).is_some());
}

#[test]
fn denied_session_fires_once_and_produces_no_outbound_traffic() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);

    client.connect().unwrap();
    client.receive();
    handle.take_sent();

    handle.deliver(&Message::SessionCreateResponse {
        index: 1,
        reply_to: 1,
        success: false,
        session_token: None,
    });
    let events = client.receive();
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, ClientEvent::SessionDenied))
            .count(),
        1
    );
    assert_eq!(client.session_token(), None);

    // a duplicate denial is dropped by reply correlation
    handle.deliver(&Message::SessionCreateResponse {
        index: 2,
        reply_to: 1,
        success: false,
        session_token: None,
    });
    let events = client.receive();
    assert!(events.is_empty());

    // without a session, user operations fail locally and nothing is sent
    assert_eq!(
        client.fetch_scope(test_scope("S"), serde_json::json!({}), |_| {}),
        Err(ClientError::NoSession)
    );
    client.receive();
    assert_eq!(handle.sent_count(), 0);
}

#[test]
fn fetch_failure_surfaces_the_structured_error() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    establish_session(&mut client, &handle, "t");
    handle.take_sent();

    let fetch_result = Rc::new(RefCell::new(None));
    let fetch_result_out = Rc::clone(&fetch_result);
    client
        .fetch_scope(test_scope("Vault"), serde_json::json!({}), move |result| {
            *fetch_result_out.borrow_mut() = Some(result);
        })
        .unwrap();
    let sent = handle.take_sent();
    let fetch_index = sent[0].index();

    handle.deliver(&Message::Reply {
        index: 5,
        reply_to: fetch_index,
        result: Some(false),
        scope_index: None,
        error: Some(ErrorBody {
            code: 403,
            message: "forbidden".to_string(),
        }),
    });
    client.receive();

    let result = fetch_result.borrow_mut().take().expect("callback fired");
    let err = result.unwrap_err();
    assert_eq!(err.code, 403);
    assert_eq!(err.message, "forbidden");
    assert!(client.scope(1).is_none());
}

#[test]
fn reply_callbacks_fire_at_most_once() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    establish_session(&mut client, &handle, "t");
    handle.take_sent();

    let calls = Rc::new(RefCell::new(0));
    let calls_out = Rc::clone(&calls);
    client
        .fetch_scope(test_scope("S"), serde_json::json!({}), move |_| {
            *calls_out.borrow_mut() += 1;
        })
        .unwrap();
    let fetch_index = handle.take_sent()[0].index();

    let reply = Message::Reply {
        index: 3,
        reply_to: fetch_index,
        result: Some(true),
        scope_index: Some(1),
        error: None,
    };
    handle.deliver(&reply);
    handle.deliver(&reply);
    client.receive();
    client.receive();

    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn closed_client_refuses_operations() {
    let (channel, handle) = MockChannel::create();
    let mut client = Client::new(channel);
    establish_session(&mut client, &handle, "t");

    client.close();
    assert_eq!(client.connect(), Err(ClientError::Closed));
    assert_eq!(client.send_ping(), Err(ClientError::Closed));
    assert!(client.receive().is_empty());
    assert!(!handle.is_connected());
}
