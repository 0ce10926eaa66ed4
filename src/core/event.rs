use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Kinds of virtual events handled by the cell list core.
///
/// Virtual events reorganize internal bookkeeping without representing a
/// physical interaction; the only kind this core schedules is a particle's
/// next cell-boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Particle `particle` crosses a boundary of its current cell.
    CellTransition { particle: u32 },
}

impl EventKind {
    #[inline]
    fn order_key(&self) -> (u8, u32) {
        match *self {
            EventKind::CellTransition { particle } => (0, particle),
        }
    }

    /// The participating particle.
    #[inline]
    pub fn particle(&self) -> u32 {
        match *self {
            EventKind::CellTransition { particle } => particle,
        }
    }
}

/// A scheduled virtual event with deterministic total order.
///
/// - `time`: occurrence time (non-NaN; `+inf` marks a crossing that never
///   happens, so a motionless particle still owns exactly one pending event).
/// - `seq`: sequence-number snapshot for lazy invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    pub kind: EventKind,
    pub seq: u64,
}

impl Event {
    /// Create a new event, rejecting NaN times.
    pub fn new(time: f64, kind: EventKind, seq: u64) -> Result<Self> {
        let time =
            NotNan::new(time).map_err(|_| Error::MathError("event time cannot be NaN".into()))?;
        Ok(Self { time, kind, seq })
    }

    /// Returns the raw f64 event time.
    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => match self.kind.order_key().cmp(&other.kind.order_key()) {
                // Final tie-breaker on the sequence snapshot for a total order.
                Ordering::Equal => self.seq.cmp(&other.seq),
                o => o,
            },
            o => o,
        }
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
