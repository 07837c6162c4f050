//! Integration tests for per-connection frame routing.
//!
//! A [`Session`] is driven directly with text frames; the frames it sends
//! back are read from its queue, so no socket is involved.

#![allow(clippy::unwrap_used, clippy::unreachable, clippy::indexing_slicing)]

mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use fable_bridge::{Frame, FrameOutcome, Session};
use fable_types::Message;
use serde_json::{Value, json};

use common::{Scripted, load_personas, test_state, wire_update};

fn message_text(message_type: &str, data: &Value, id: Option<u64>) -> String {
    Frame::event("message", Frame::envelope_args(message_type, data), id)
        .to_text()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn choose_sequence_right_after_its_tick_is_answered() {
    let state = test_state("session_order", Scripted::default());
    let guids: Vec<String> = (0..200_u64).map(|n| format!("p{n}")).collect();
    let refs: Vec<&str> = guids.iter().map(String::as_str).collect();
    load_personas(&state, &refs).await;
    let (session, mut frames) = Session::open(state.clone());

    for (n, guid) in (1_u64..).zip(&guids) {
        let tick = json!({
            "timestamp": format!("2024-03-04T08:{:02}:{:02}Z", n / 60, n % 60),
            "updates": [wire_update(guid, 0.0, "idle")],
        });
        let choose = json!({"persona_guid": guid});
        assert_eq!(
            session.on_text(&message_text("character-status-update-tick", &tick, None)),
            FrameOutcome::Queued
        );
        assert_eq!(
            session.on_text(&message_text("choose-sequence", &choose, Some(n))),
            FrameOutcome::Queued
        );
    }

    let mut acked = BTreeSet::new();
    while acked.len() < guids.len() {
        let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv()).await;
        let Ok(Some(Frame::Ack { ack, args })) = frame else {
            break;
        };
        assert_eq!(args[0], "choose-sequence-response");
        acked.insert(ack);
    }
    assert_eq!(acked.len(), guids.len());
    assert_eq!(state.store.read().await.tick_count(), guids.len());
}

#[tokio::test]
async fn ack_frame_resolves_pending_request() {
    let state = test_state("session_ack", Scripted::default());
    let (session, mut frames) = Session::open(state.clone());

    let rpc = state.rpc.clone();
    let request = tokio::spawn(async move {
        rpc.request_reply("request-personas", &json!({"guids": []}))
            .await
    });

    let Some(Frame::Event { id: Some(id), .. }) = frames.recv().await else {
        unreachable!("expected a correlated request");
    };
    let ack = json!({"ack": id, "args": ["request-personas-response", "{\"personas\": []}"]});
    assert_eq!(session.on_text(&ack.to_string()), FrameOutcome::AckResolved);

    let reply = request.await.unwrap();
    assert_eq!(
        reply,
        Message::new("request-personas-response", json!({"personas": []}))
    );
    assert_eq!(
        session.on_text(&ack.to_string()),
        FrameOutcome::AckUnknown
    );
}

#[tokio::test]
async fn echo_and_ack_events_are_answered_inline() {
    let state = test_state("session_echo", Scripted::default());
    let (session, mut frames) = Session::open(state);

    assert_eq!(
        session.on_text(r#"{"event": "echo", "args": ["hi", 2]}"#),
        FrameOutcome::Replied
    );
    assert_eq!(
        frames.try_recv().ok(),
        Some(Frame::event("echo", vec![Value::from("hi"), Value::from(2)], None))
    );

    assert_eq!(
        session.on_text(r#"{"event": "ack", "args": ["ok"], "id": 9}"#),
        FrameOutcome::Replied
    );
    assert_eq!(
        frames.try_recv().ok(),
        Some(Frame::ack(9, vec![Value::from("ok")]))
    );

    assert_eq!(
        session.on_text(r#"{"event": "ack", "args": ["ok"]}"#),
        FrameOutcome::Dropped
    );
    assert!(frames.try_recv().is_err());
}

#[tokio::test]
async fn heartbeat_and_bad_frames_send_nothing() {
    let state = test_state("session_bad", Scripted::default());
    let (session, mut frames) = Session::open(state.clone());

    assert_eq!(
        session.on_text(r#"{"event": "heartbeat", "args": []}"#),
        FrameOutcome::Heartbeat
    );
    for text in [
        "not json",
        r#"{"args": []}"#,
        r#"{"event": "message", "args": [5, "{}"]}"#,
        r#"{"event": "message", "args": []}"#,
        r#"{"event": "teleport", "args": []}"#,
    ] {
        assert_eq!(session.on_text(text), FrameOutcome::Dropped, "{text}");
    }

    tokio::task::yield_now().await;
    assert!(frames.try_recv().is_err());
    assert_eq!(state.store.read().await.tick_count(), 0);
}

#[tokio::test]
async fn closing_clears_the_active_session() {
    let state = test_state("session_close", Scripted::default());
    let (session, _frames) = Session::open(state.clone());
    assert_eq!(state.connections.active_session(), Some(session.id()));

    assert!(session.close());
    assert_eq!(state.connections.active_session(), None);
}

#[tokio::test]
async fn newer_session_replaces_older_and_ignores_its_close() {
    let state = test_state("session_replace", Scripted::default());
    let (first, _first_frames) = Session::open(state.clone());
    let (second, mut second_frames) = Session::open(state.clone());
    let second_id = second.id();
    assert_eq!(state.connections.active_session(), Some(second_id));

    assert!(!first.close());
    assert_eq!(state.connections.active_session(), Some(second_id));

    // Bridge-initiated requests now go to the newer session.
    let rpc = state.rpc.clone();
    tokio::spawn(async move { rpc.request_reply("request-personas", &json!({"guids": []})).await });
    assert!(matches!(
        second_frames.recv().await,
        Some(Frame::Event { ref event, .. }) if event == "message-ack"
    ));

    assert!(second.close());
    assert_eq!(state.connections.active_session(), None);
}

#[tokio::test]
async fn queued_message_reaches_the_store() {
    let state = test_state("session_tick", Scripted::default());
    load_personas(&state, &["ada"]).await;
    let (session, _frames) = Session::open(state.clone());

    let tick = json!({
        "timestamp": "2024-03-04T08:00:00Z",
        "updates": [wire_update("ada", 1.0, "paint")],
    });
    session.on_text(&message_text("character-status-update-tick", &tick, None));

    for _ in 0..100 {
        if state.store.read().await.tick_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(state.store.read().await.tick_count(), 1);
}
