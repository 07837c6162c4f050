//! Prompt-facing projections of bridge records.
//!
//! Templates receive these as JSON strings. The key names are part of the
//! prompt contract, so they match what the simulation itself uses
//! (`PascalCase` persona cards, `snake_case` everything else).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use fable_types::{ObservationEvent, Persona, StatusUpdate};

/// Persona card used as the persona's self-description.
pub fn persona_card(persona: &Persona) -> Value {
    json!({
        "ID": persona.guid,
        "FirstName": persona.first_name,
        "LastName": persona.last_name,
        "Description": persona.description,
        "Summary": persona.summary,
        "BackStory": persona.backstory,
    })
}

/// One observation candidate as shown to the model.
///
/// Once annotated, the summary stands in for the raw action and step.
pub fn observation_entry(event: &ObservationEvent) -> Value {
    let mut out = Map::new();
    out.insert("persona_guid".to_owned(), json!(event.persona_guid));

    match event.summary.as_deref().filter(|s| !s.is_empty()) {
        Some(summary) => {
            out.insert("summary".to_owned(), json!(summary));
        }
        None => {
            out.insert("action".to_owned(), json!(event.action));
            out.insert("action_step".to_owned(), json!(event.action_step));
        }
    }

    out.insert("distance".to_owned(), json!(format_metres(event.distance)));

    if let Some(importance) = event.importance {
        out.insert("importance".to_owned(), json!(importance));
    }

    Value::Object(out)
}

/// The observer's own current state.
pub fn observer_card(update: &StatusUpdate) -> Value {
    let mut out = Map::new();
    out.insert("action".to_owned(), json!(update.sequence));
    out.insert("action_step".to_owned(), json!(update.sequence_step));
    if let Some(distance) = update.destination_distance() {
        out.insert(
            "destination_distance".to_owned(),
            json!(format_metres(distance)),
        );
    }
    Value::Object(out)
}

/// Time of day in the form `Monday, 08:00 AM`.
pub fn time_of_day(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%A, %I:%M %p").to_string()
}

fn format_metres(distance: f64) -> String {
    format!("{distance:.2}m")
}
