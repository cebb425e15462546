// End-to-end messaging over the in-memory stores:
// bind connections, send, fan out, page history, track presence.

mod common;

use common::{connect, drain, mutual, of_type, state, user};
use messenger_service::models::{HistoryDirection, HistoryQuery};
use messenger_service::websocket::ConnectionId;

#[tokio::test]
async fn test_message_reaches_recipient_and_other_sender_connections() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    mutual(&state, &alice, &bob).await;

    let (alice_phone, mut alice_phone_rx) = connect(&state, &alice).await;
    let (_, mut alice_laptop_rx) = connect(&state, &alice).await;
    let (_, mut bob_rx) = connect(&state, &bob).await;
    drain(&mut alice_phone_rx);
    drain(&mut alice_laptop_rx);
    drain(&mut bob_rx);

    let sent = state
        .chat
        .send(&alice, &bob.uuid.to_string(), "hi bob", Some(alice_phone))
        .await
        .unwrap();
    assert_eq!(sent.text, "hi bob");
    assert_eq!(sent.sender_uuid, alice.uuid);
    assert_eq!(sent.recipient_uuid, bob.uuid);

    let bob_frames = of_type(&drain(&mut bob_rx), "new-message");
    assert_eq!(bob_frames.len(), 1);
    assert_eq!(bob_frames[0]["text"], "hi bob");
    assert_eq!(bob_frames[0]["seq"], sent.seq);

    // The submitting connection gets a send-ack from the socket handler instead.
    assert!(of_type(&drain(&mut alice_phone_rx), "new-message").is_empty());
    assert_eq!(of_type(&drain(&mut alice_laptop_rx), "new-message").len(), 1);
}

#[tokio::test]
async fn test_offline_recipient_reads_history_later() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;

    let sent = state
        .chat
        .send(&alice, &bob.uuid.to_string(), "are you there?", None)
        .await
        .unwrap();

    let page = state
        .chat
        .history(&bob, alice.uuid, &HistoryQuery::latest(50))
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].seq, sent.seq);
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_messages_arrive_and_list_in_send_order() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    let (_, mut bob_rx) = connect(&state, &bob).await;
    drain(&mut bob_rx);

    for text in ["m1", "m2"] {
        state
            .chat
            .send(&alice, &bob.uuid.to_string(), text, None)
            .await
            .unwrap();
    }

    let texts: Vec<_> = of_type(&drain(&mut bob_rx), "new-message")
        .iter()
        .map(|f| f["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["m1", "m2"]);

    let page = state
        .chat
        .history(&alice, bob.uuid, &HistoryQuery::latest(10))
        .await
        .unwrap();
    let texts: Vec<_> = page.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_history_pages_backward_then_forward() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    for i in 0..5 {
        let (from, to) = if i % 2 == 0 { (&alice, &bob) } else { (&bob, &alice) };
        state
            .chat
            .send(from, &to.uuid.to_string(), &format!("m{i}"), None)
            .await
            .unwrap();
    }

    let first = state
        .chat
        .history(&alice, bob.uuid, &HistoryQuery::latest(2))
        .await
        .unwrap();
    let texts: Vec<_> = first.messages.iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["m3", "m4"]);
    assert!(first.has_more);

    let cursor = first.next_cursor.clone().unwrap();
    let query = HistoryQuery {
        cursor: Some(messenger_service::models::HistoryCursor::decode(&cursor).unwrap()),
        direction: HistoryDirection::Backward,
        limit: 2,
    };
    let second = state.chat.history(&alice, bob.uuid, &query).await.unwrap();
    let texts: Vec<_> = second.messages.iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["m1", "m2"]);

    // Reading forward from the oldest message of the first page returns
    // nothing newer than the newest one.
    let forward = HistoryQuery {
        cursor: Some(messenger_service::models::HistoryCursor::decode(&cursor).unwrap()),
        direction: HistoryDirection::Forward,
        limit: 10,
    };
    let newer = state.chat.history(&alice, bob.uuid, &forward).await.unwrap();
    let texts: Vec<_> = newer.messages.iter().map(|m| m.text.clone()).collect();
    assert_eq!(texts, vec!["m4"]);
    assert!(!newer.has_more);
}

#[tokio::test]
async fn test_invalid_sends_are_rejected_without_side_effects() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    let (_, mut bob_rx) = connect(&state, &bob).await;
    drain(&mut bob_rx);

    let err = state
        .chat
        .send(&alice, "not-a-uuid", "hello", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RECIPIENT_INVALID");

    let err = state
        .chat
        .send(&alice, &uuid::Uuid::new_v4().to_string(), "hello", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RECIPIENT_INVALID");

    let err = state
        .chat
        .send(&alice, &bob.uuid.to_string(), "   ", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MESSAGE_EMPTY");

    let long = "x".repeat(state.config.max_message_length + 1);
    let err = state
        .chat
        .send(&alice, &bob.uuid.to_string(), &long, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MESSAGE_TOO_LONG");

    assert!(drain(&mut bob_rx).is_empty());
    let page = state
        .chat
        .history(&alice, bob.uuid, &HistoryQuery::latest(10))
        .await
        .unwrap();
    assert!(page.messages.is_empty());
}

#[tokio::test]
async fn test_presence_goes_only_to_watchers() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    let carol = user(&state, "carol").await;

    // bob watches alice; carol has no edge to alice.
    state.contacts.add_contact(bob.id, alice.id).await.unwrap();

    let (_, mut bob_rx) = connect(&state, &bob).await;
    let (_, mut carol_rx) = connect(&state, &carol).await;
    drain(&mut bob_rx);
    drain(&mut carol_rx);

    let (alice_conn, mut alice_rx) = connect(&state, &alice).await;
    let snapshot = of_type(&drain(&mut alice_rx), "presence-snapshot");
    assert_eq!(snapshot[0]["online"], serde_json::json!([]));

    let changed = of_type(&drain(&mut bob_rx), "presence-changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["user_uuid"], alice.uuid.to_string());
    assert_eq!(changed[0]["online"], true);
    assert!(drain(&mut carol_rx).is_empty());

    // A second connection is not a new arrival.
    let (second, _second_rx) = connect(&state, &alice).await;
    assert!(drain(&mut bob_rx).is_empty());

    state.binder.release(alice.uuid, alice_conn).await;
    assert!(drain(&mut bob_rx).is_empty());

    state.binder.release(alice.uuid, second).await;
    let changed = of_type(&drain(&mut bob_rx), "presence-changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["online"], false);
    assert!(drain(&mut carol_rx).is_empty());
}

#[tokio::test]
async fn test_releasing_unknown_connection_is_a_no_op() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    state.contacts.add_contact(bob.id, alice.id).await.unwrap();

    let (_, mut bob_rx) = connect(&state, &bob).await;
    let (_, _alice_rx) = connect(&state, &alice).await;
    drain(&mut bob_rx);

    state.binder.release(alice.uuid, ConnectionId::new()).await;
    state.binder.release(bob.uuid, ConnectionId::new()).await;

    assert!(state.registry.is_online(alice.uuid).await);
    assert!(state.registry.is_online(bob.uuid).await);
    assert_eq!(state.registry.connection_count().await, 2);
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn test_dead_connection_is_evicted_on_delivery() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    mutual(&state, &alice, &bob).await;

    let (_, mut alice_rx) = connect(&state, &alice).await;
    let (_, bob_rx) = connect(&state, &bob).await;
    drain(&mut alice_rx);
    drop(bob_rx);

    let sent = state
        .chat
        .send(&alice, &bob.uuid.to_string(), "still there?", None)
        .await;
    assert!(sent.is_ok());

    assert!(!state.registry.is_online(bob.uuid).await);
    let frames = drain(&mut alice_rx);
    let changed = of_type(&frames, "presence-changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["user_uuid"], bob.uuid.to_string());
    assert_eq!(changed[0]["online"], false);
}

#[tokio::test]
async fn test_conversation_survives_recipient_reconnect() {
    let state = state();
    let alice = user(&state, "alice").await;
    let bob = user(&state, "bob").await;
    mutual(&state, &alice, &bob).await;

    let (_, mut c1) = connect(&state, &alice).await;
    let (c2_id, mut c2) = connect(&state, &bob).await;
    drain(&mut c1);
    drain(&mut c2);

    state
        .chat
        .send(&alice, &bob.uuid.to_string(), "hi", None)
        .await
        .unwrap();
    let echo = of_type(&drain(&mut c1), "new-message");
    assert_eq!(echo.len(), 1);
    assert_eq!(echo[0]["text"], "hi");
    let delivered = of_type(&drain(&mut c2), "new-message");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0]["text"], "hi");

    state.binder.release(bob.uuid, c2_id).await;
    assert!(!state.registry.is_online(bob.uuid).await);
    let changed = of_type(&drain(&mut c1), "presence-changed");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["online"], false);

    state
        .chat
        .send(&alice, &bob.uuid.to_string(), "you there?", None)
        .await
        .unwrap();
    assert!(drain(&mut c2).is_empty());

    let (_, mut c3) = connect(&state, &bob).await;
    let frames = drain(&mut c3);
    assert!(of_type(&frames, "new-message").is_empty());
    let snapshot = of_type(&frames, "presence-snapshot");
    assert_eq!(snapshot[0]["online"][0], alice.uuid.to_string());

    let page = state
        .chat
        .history(&bob, alice.uuid, &HistoryQuery::latest(50))
        .await
        .unwrap();
    let texts: Vec<&str> = page.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["hi", "you there?"]);
}
