//! Per-observer record of the observation set last shown to the
//! reasoning backend.
//!
//! Keyed by `(observer, timestamp)`. Writes for the same key replace the
//! previous set; nothing is merged across ticks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fable_types::{ObservationEvent, PersonaGuid};

/// Observation sets keyed by observer and tick.
#[derive(Debug, Default)]
pub struct ObservationMemory {
    records: BTreeMap<PersonaGuid, BTreeMap<DateTime<Utc>, Vec<ObservationEvent>>>,
}

impl ObservationMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the observation set for `observer` at `timestamp`, replacing
    /// any earlier set for the same key.
    pub fn record(
        &mut self,
        observer: PersonaGuid,
        timestamp: DateTime<Utc>,
        events: Vec<ObservationEvent>,
    ) {
        self.records
            .entry(observer)
            .or_default()
            .insert(timestamp, events);
    }

    /// The most recent observation set for `observer`.
    pub fn latest(&self, observer: &PersonaGuid) -> Option<(DateTime<Utc>, &[ObservationEvent])> {
        self.records
            .get(observer)
            .and_then(|by_tick| by_tick.iter().next_back())
            .map(|(ts, events)| (*ts, events.as_slice()))
    }

    /// Number of observers with at least one record.
    pub fn observer_count(&self) -> usize {
        self.records.len()
    }
}
