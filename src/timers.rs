//! Timing of apply phases.
//!
//! A [`PhaseTimer`] adds the time between its creation and its drop to a
//! `Duration` slot, so an early return through `?` still gets counted.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

/// RAII timer that records elapsed time to a mutable slot on Drop.
///
/// The timer starts when created and adds the elapsed time to the provided
/// `Duration` slot when dropped, including on an early return.
///
/// ```rust,ignore
/// let mut creating = Duration::ZERO;
/// {
///     let _timer = PhaseTimer::new(&mut creating);
///     // ... remote calls being measured ...
/// } // dropped here, creating is updated
/// ```
pub struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    /// Create a new timer that will accumulate elapsed time to `slot`.
    pub fn new(slot: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

/// Wall-clock time spent in each phase of one apply or removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyPhases {
    pub packing: Duration,
    pub creating: Duration,
    pub attaching: Duration,
    pub verifying: Duration,
    pub detaching: Duration,
}

impl ApplyPhases {
    pub fn total(&self) -> Duration {
        self.packing + self.creating + self.attaching + self.verifying + self.detaching
    }

    pub(crate) fn log(&self, principal: &str) {
        debug!(
            event = "Apply",
            phase = "Timings",
            principal,
            packing_ms = self.packing.as_secs_f64() * 1000.0,
            creating_ms = self.creating.as_secs_f64() * 1000.0,
            attaching_ms = self.attaching.as_secs_f64() * 1000.0,
            verifying_ms = self.verifying.as_secs_f64() * 1000.0,
            detaching_ms = self.detaching.as_secs_f64() * 1000.0,
            total_ms = self.total().as_secs_f64() * 1000.0
        );
    }
}
