//! Spatial observation-candidate filter.
//!
//! Turns an observer's status update and the other entities' updates into a
//! ranked, bounded list of [`ObservationEvent`]s. The list order is the
//! priority signal handed to the reasoning backend: nearest first.
//!
//! The limit is applied **before** the radius check. Reordering the two
//! changes which candidates survive, not just their ranking.

use fable_types::{ObservationEvent, StatusUpdate};

/// Default observation radius in metres.
pub const DEFAULT_RADIUS: f64 = 10.0;

/// Default maximum number of candidates.
pub const DEFAULT_LIMIT: usize = 10;

/// Radius and limit applied by [`select_candidates`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Maximum observer-to-candidate distance, inclusive.
    pub radius: f64,
    /// Maximum number of candidates considered.
    pub limit: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Select the observation candidates for `observer`.
///
/// 1. Drop the observer's own update (by guid).
/// 2. Measure each remaining candidate's distance to the observer.
/// 3. Stable-sort ascending by distance, so ties keep input order.
/// 4. Keep the first `limit`, then drop any farther than `radius`.
/// 5. Capture each survivor as an [`ObservationEvent`].
pub fn select_candidates(
    observer: &StatusUpdate,
    candidates: &[StatusUpdate],
    params: FilterParams,
) -> Vec<ObservationEvent> {
    let mut ranked: Vec<(f64, &StatusUpdate)> = candidates
        .iter()
        .filter(|c| c.guid != observer.guid)
        .map(|c| (observer.location.distance(&c.location), c))
        .collect();

    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    ranked
        .into_iter()
        .take(params.limit)
        .filter(|(distance, _)| *distance <= params.radius)
        .map(|(distance, candidate)| ObservationEvent::from_status_update(candidate, distance))
        .collect()
}
