//! Integration tests for the message router and the inbound request path.
//!
//! The reasoning backend is a scripted double; everything else is the
//! real store, memory, filter and prompt engine.

#![allow(clippy::unwrap_used, clippy::unreachable, clippy::indexing_slicing)]

mod common;

use fable_bridge::rpc::handle_incoming;
use fable_bridge::{Frame, MessageRouter};
use fable_types::{Message, PersonaGuid};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use common::{Scripted, load_personas, test_state, wire_update};

const TICK_1: &str = "2024-03-04T08:00:00Z";
const TICK_2: &str = "2024-03-04T08:00:05Z";

fn tick(timestamp: &str, updates: Vec<Value>) -> Message {
    Message::new(
        "character-status-update-tick",
        json!({ "timestamp": timestamp, "updates": updates }),
    )
}

/// wyatt_cooper (the default auto-observer) at the origin, ada 3 m away,
/// bob 50 m away.
fn town_square() -> Vec<Value> {
    vec![
        wire_update("wyatt_cooper", 0.0, "idle"),
        wire_update("ada", 3.0, "paint"),
        wire_update("bob", 50.0, "fish"),
    ]
}

#[tokio::test]
async fn tick_is_recorded_and_observed() {
    let state = test_state(
        "tick_observed",
        Scripted::with_responses(&[
            r#"[{"guid": "ada", "summary_of_activity": "painting a fence", "importance": 4}]"#,
        ]),
    );
    load_personas(&state, &["wyatt_cooper", "ada", "bob"]).await;
    let router = MessageRouter::new(state.clone());

    let reply = router.route(tick(TICK_1, town_square())).await;
    assert!(reply.is_none());

    assert_eq!(state.store.read().await.tick_count(), 1);
    assert_eq!(state.reasoning.backend().calls(), 1);

    let memory = state.memory.read().await;
    let (_, events) = memory.latest(&PersonaGuid::from("wyatt_cooper")).unwrap();
    // bob is beyond the radius; wyatt never observes himself.
    assert_eq!(events.len(), 1);
    let ada = &events[0];
    assert_eq!(ada.persona_guid, PersonaGuid::from("ada"));
    assert_eq!(ada.summary.as_deref(), Some("painting a fence"));
    assert_eq!(ada.importance, Some(4));
    assert!((ada.distance - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn duplicate_tick_is_rejected_without_observing() {
    let state = test_state("tick_duplicate", Scripted::default());
    load_personas(&state, &["wyatt_cooper", "ada"]).await;
    let router = MessageRouter::new(state.clone());

    router.route(tick(TICK_1, town_square())).await;
    router.route(tick(TICK_1, town_square())).await;

    assert_eq!(state.store.read().await.tick_count(), 1);
    assert_eq!(state.reasoning.backend().calls(), 1);
}

#[tokio::test]
async fn tick_skips_undecodable_updates() {
    let state = test_state("tick_partial", Scripted::default());
    let router = MessageRouter::new(state.clone());

    let updates = vec![
        wire_update("ada", 1.0, "paint"),
        Value::from("{not json"),
        json!({"guid": "bob"}),
    ];
    router.route(tick(TICK_1, updates)).await;

    let store = state.store.read().await;
    let (_, batch) = store.latest_tick().unwrap();
    assert_eq!(batch.len(), 1);
    assert!(store.latest_update_for(&PersonaGuid::from("ada")).is_some());
}

#[tokio::test]
async fn observer_without_persona_record_is_skipped() {
    let state = test_state("tick_no_persona", Scripted::default());
    let router = MessageRouter::new(state.clone());

    router.route(tick(TICK_1, town_square())).await;

    assert_eq!(state.store.read().await.tick_count(), 1);
    assert_eq!(state.reasoning.backend().calls(), 0);
    assert_eq!(state.memory.read().await.observer_count(), 0);
}

#[tokio::test]
async fn newer_tick_shadows_older_update() {
    let state = test_state("tick_shadow", Scripted::default());
    let router = MessageRouter::new(state.clone());

    router
        .route(tick(TICK_1, vec![wire_update("ada", 1.0, "paint")]))
        .await;
    router
        .route(tick(TICK_2, vec![wire_update("ada", 2.0, "eat")]))
        .await;

    let store = state.store.read().await;
    let latest = store.latest_update_for(&PersonaGuid::from("ada")).unwrap();
    assert_eq!(latest.sequence, "eat");
}

#[tokio::test]
async fn choose_sequence_replies_with_options() {
    let state = test_state(
        "choose",
        Scripted::with_responses(&[
            r#"[{"guid": "ada", "summary_of_activity": "painting", "importance": 2}]"#,
            r#"```json
[{"action": "talk_to", "target": "ada"}, {"action": "eat"},]
```"#,
        ]),
    );
    load_personas(&state, &["wyatt_cooper", "ada"]).await;
    let router = MessageRouter::new(state.clone());
    router.route(tick(TICK_1, town_square())).await;

    let reply = router
        .route(Message::new(
            "choose-sequence",
            json!({"persona_guid": "wyatt_cooper"}),
        ))
        .await
        .unwrap();

    assert_eq!(reply.message_type, "choose-sequence-response");
    assert_eq!(
        reply.data,
        json!({"options": [{"action": "talk_to", "target": "ada"}, {"action": "eat"}]})
    );
}

#[tokio::test]
async fn choose_sequence_for_unknown_persona_is_dropped() {
    let state = test_state("choose_unknown", Scripted::default());
    let router = MessageRouter::new(state.clone());

    let reply = router
        .route(Message::new("choose-sequence", json!({"persona_guid": "nobody"})))
        .await;

    assert!(reply.is_none());
    assert_eq!(state.reasoning.backend().calls(), 0);
}

#[tokio::test]
async fn malformed_payloads_do_not_panic() {
    let state = test_state("malformed", Scripted::default());
    load_personas(&state, &["wyatt_cooper"]).await;
    let router = MessageRouter::new(state.clone());

    for message in [
        Message::new("choose-sequence", Value::from("persona_guid=wyatt_cooper")),
        Message::new("choose-sequence", json!({"persona_guid": 7})),
        Message::new("character-status-update-tick", Value::from("garbage")),
        Message::new("character-status-update-tick", json!({"timestamp": "yesterday"})),
        Message::new("character-conversation", Value::from("garbage")),
        Message::new("character-sequence-step", json!({"sequence": "{broken"})),
        Message::new("no-such-type", json!({"anything": true})),
    ] {
        assert!(router.route(message).await.is_none());
    }

    assert_eq!(state.store.read().await.tick_count(), 0);
    assert_eq!(state.reasoning.backend().calls(), 0);
}

#[tokio::test]
async fn decode_only_types_leave_state_untouched() {
    let state = test_state("decode_only", Scripted::default());
    let router = MessageRouter::new(state.clone());

    let conversation = Message::new(
        "character-conversation",
        json!({
            "timestamp": TICK_1,
            "conversation": json!({
                "participants": ["ada", "bob"],
                "lines": [{"speaker": "ada", "text": "Morning!"}]
            }).to_string(),
        }),
    );
    let step = Message::new(
        "character-sequence-step",
        json!({
            "timestamp": TICK_1,
            "sequence": {"guid": "ada", "sequence": "paint", "sequence_step": "mix colours"},
        }),
    );

    assert!(router.route(conversation).await.is_none());
    assert!(router.route(step).await.is_none());
    assert!(state.store.read().await.is_empty());
    assert_eq!(state.store.read().await.tick_count(), 0);
}

#[tokio::test]
async fn inbound_request_is_acknowledged_with_reply() {
    let state = test_state(
        "inbound_ack",
        Scripted::with_responses(&["[]", r#"[{"action": "sleep"}]"#]),
    );
    load_personas(&state, &["wyatt_cooper", "ada"]).await;
    let router = MessageRouter::new(state.clone());
    router.route(tick(TICK_1, town_square())).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let payload = Value::from(json!({"persona_guid": "wyatt_cooper"}).to_string());
    let sent = handle_incoming(&router, "choose-sequence", payload, Some(11), &tx).await;
    assert!(sent);

    let Frame::Ack { ack, args } = rx.try_recv().unwrap() else {
        unreachable!("expected an ack frame");
    };
    assert_eq!(ack, 11);
    assert_eq!(args[0], "choose-sequence-response");
    let data: Value = serde_json::from_str(args[1].as_str().unwrap()).unwrap();
    assert_eq!(data, json!({"options": [{"action": "sleep"}]}));
}

#[tokio::test]
async fn inbound_fire_and_forget_sends_nothing() {
    let state = test_state("inbound_fire", Scripted::default());
    let router = MessageRouter::new(state.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let payload = Value::from(json!({"timestamp": TICK_1, "updates": []}).to_string());
    let sent = handle_incoming(&router, "character-status-update-tick", payload, Some(3), &tx).await;

    assert!(!sent);
    assert!(rx.try_recv().is_err());
    assert_eq!(state.store.read().await.tick_count(), 1);
}
