use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::domain::UnitState;

pub type UnitId = usize;

/// Read-only view of one unit, as rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub label: String,
    pub state: UnitState,
    pub bytes_received: u64,
    pub bytes_expected: Option<u64>,
    pub fraction: f32,
}

/// Aggregate view of a whole run. `fraction` is in [0, 1] and never
/// decreases while a run is neither failed nor cancelled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub fraction: f32,
    pub units: Vec<UnitSnapshot>,
}

#[derive(Debug)]
struct UnitProgress {
    label: String,
    state: UnitState,
    bytes_received: u64,
    bytes_expected: Option<u64>,
}

#[derive(Debug, Default)]
struct TrackerState {
    units: BTreeMap<UnitId, UnitProgress>,
    // A late-arriving expected size re-weights the aggregate; the published
    // fraction must still never move backwards.
    high_water: f32,
}

/// Aggregates per-unit byte counters into one fraction. Written only by the
/// workflow runner; read concurrently by the presentation layer through
/// `snapshot`/`subscribe` without ever blocking the runner.
///
/// Publishing goes through a watch channel, so at most one pending update is
/// ever in flight to the UI regardless of how fast units report.
pub struct ProgressTracker {
    inner: Mutex<TrackerState>,
    publisher: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(ProgressSnapshot::default());
        Self {
            inner: Mutex::new(TrackerState::default()),
            publisher,
        }
    }

    /// Register a unit before its transfer starts. Registration order fixes
    /// the display order.
    pub fn register(&self, id: UnitId, label: &str) {
        let mut state = self.inner.lock().expect("progress tracker poisoned");
        state.units.insert(
            id,
            UnitProgress {
                label: label.to_string(),
                state: UnitState::Pending,
                bytes_received: 0,
                bytes_expected: None,
            },
        );
        self.publish(&mut state);
    }

    /// Record a byte-count update. Regressions are ignored so the aggregate
    /// fraction stays monotone.
    pub fn update(&self, id: UnitId, bytes_received: u64, bytes_expected: Option<u64>) {
        let mut state = self.inner.lock().expect("progress tracker poisoned");
        if let Some(unit) = state.units.get_mut(&id) {
            unit.bytes_received = unit.bytes_received.max(bytes_received);
            if unit.bytes_expected.is_none() {
                unit.bytes_expected = bytes_expected;
            }
        }
        self.publish(&mut state);
    }

    /// Record a unit state transition.
    pub fn mark(&self, id: UnitId, state: UnitState) {
        let mut tracker = self.inner.lock().expect("progress tracker poisoned");
        if let Some(unit) = tracker.units.get_mut(&id) {
            unit.state = state;
        }
        self.publish(&mut tracker);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.inner.lock().expect("progress tracker poisoned");
        let mut snapshot = Self::reduce(&state.units);
        snapshot.fraction = snapshot.fraction.max(state.high_water);
        snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.publisher.subscribe()
    }

    fn publish(&self, state: &mut TrackerState) {
        let mut snapshot = Self::reduce(&state.units);
        snapshot.fraction = snapshot.fraction.max(state.high_water);
        state.high_water = snapshot.fraction;
        self.publisher.send_replace(snapshot);
    }

    fn reduce(inner: &BTreeMap<UnitId, UnitProgress>) -> ProgressSnapshot {
        let known: Vec<u64> = inner
            .values()
            .filter_map(|unit| unit.bytes_expected.filter(|&b| b > 0))
            .collect();
        // Units with an unknown size get the average known weight, so one
        // size-less unit cannot dominate or vanish from the aggregate.
        let default_weight = if known.is_empty() {
            1
        } else {
            known.iter().sum::<u64>() / known.len() as u64
        }
        .max(1);

        let mut weighted = 0f64;
        let mut total = 0f64;
        let mut units = Vec::with_capacity(inner.len());
        for (&id, unit) in inner.iter() {
            let fraction = match unit.bytes_expected {
                Some(expected) if expected > 0 => {
                    (unit.bytes_received as f64 / expected as f64).min(1.0)
                }
                _ if unit.state == UnitState::Succeeded => 1.0,
                _ => 0.0,
            };
            let weight = unit.bytes_expected.filter(|&b| b > 0).unwrap_or(default_weight) as f64;
            weighted += fraction * weight;
            total += weight;
            units.push(UnitSnapshot {
                id,
                label: unit.label.clone(),
                state: unit.state,
                bytes_received: unit.bytes_received,
                bytes_expected: unit.bytes_expected,
                fraction: fraction as f32,
            });
        }

        let fraction = if total > 0.0 {
            (weighted / total) as f32
        } else {
            0.0
        };
        ProgressSnapshot { fraction, units }
    }
}
