//! Persona records and the rolling history of entity status updates.
//!
//! Ticks are keyed by their timestamp, so iteration order is temporal order
//! even when two in-flight handlers insert ticks out of arrival order.
//! Nothing is ever evicted: history grows for the lifetime of the process.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use fable_types::{Persona, PersonaGuid, StatusUpdate};
use tracing::{debug, warn};

/// Errors raised by [`StateStore`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A tick with this timestamp was already recorded.
    #[error("tick {timestamp} already recorded")]
    DuplicateTick {
        /// The repeated timestamp.
        timestamp: DateTime<Utc>,
    },
}

/// Process-wide store of personas and status-update ticks.
#[derive(Debug, Default)]
pub struct StateStore {
    personas: BTreeMap<PersonaGuid, Persona>,
    ticks: BTreeMap<DateTime<Utc>, Vec<StatusUpdate>>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace personas by guid. Returns how many were written.
    pub fn upsert_personas(&mut self, personas: Vec<Persona>) -> usize {
        let count = personas.len();
        for persona in personas {
            self.personas.insert(persona.guid.clone(), persona);
        }
        if count > 0 {
            debug!(count, total = self.personas.len(), "personas upserted");
        }
        count
    }

    /// Append a tick of updates.
    ///
    /// Updates within one tick are distinct by guid; a repeated guid keeps
    /// the first entry and the rest are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTick`] if `timestamp` was already
    /// recorded. The existing tick is left untouched.
    pub fn add_tick(
        &mut self,
        timestamp: DateTime<Utc>,
        updates: Vec<StatusUpdate>,
    ) -> Result<(), StoreError> {
        if self.ticks.contains_key(&timestamp) {
            return Err(StoreError::DuplicateTick { timestamp });
        }

        let mut seen = BTreeSet::new();
        let mut distinct = Vec::with_capacity(updates.len());
        for update in updates {
            if seen.insert(update.guid.clone()) {
                distinct.push(update);
            } else {
                warn!(
                    guid = %update.guid,
                    %timestamp,
                    "duplicate guid within one tick, keeping the first update"
                );
            }
        }

        debug!(%timestamp, updates = distinct.len(), "tick recorded");
        self.ticks.insert(timestamp, distinct);
        Ok(())
    }

    /// Most recent status update for `guid`, scanning newest tick first.
    pub fn latest_update_for(&self, guid: &PersonaGuid) -> Option<&StatusUpdate> {
        self.ticks
            .values()
            .rev()
            .find_map(|updates| updates.iter().find(|u| &u.guid == guid))
    }

    /// The newest tick and its updates.
    pub fn latest_tick(&self) -> Option<(DateTime<Utc>, &[StatusUpdate])> {
        self.ticks
            .iter()
            .next_back()
            .map(|(ts, updates)| (*ts, updates.as_slice()))
    }

    /// Look up one persona.
    pub fn persona(&self, guid: &PersonaGuid) -> Option<&Persona> {
        self.personas.get(guid)
    }

    /// Guids of every loaded persona.
    pub fn persona_guids(&self) -> BTreeSet<PersonaGuid> {
        self.personas.keys().cloned().collect()
    }

    /// True iff no personas are loaded.
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Number of loaded personas.
    pub fn persona_count(&self) -> usize {
        self.personas.len()
    }

    /// Number of recorded ticks.
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }
}
