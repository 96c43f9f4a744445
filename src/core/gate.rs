//! Frame intake gate
//!
//! Every frame offered by the camera goes through `offer()`:
//! 1. stopped → `Stopped` (not counted)
//! 2. not the Rth frame → `Skipped`
//! 3. an analysis is in flight → `Busy` (dropped, never queued)
//! 4. otherwise → `Dispatch(permit)`; the busy flag is held until the permit drops

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Counters since the gate was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub offered: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub dispatched: u64,
}

#[derive(Debug)]
pub enum GateDecision {
    Dispatch(AnalysisPermit),
    Skipped,
    Busy,
    Stopped,
}

impl GateDecision {
    pub fn is_dispatch(&self) -> bool {
        matches!(self, GateDecision::Dispatch(_))
    }
}

#[derive(Debug)]
pub struct FrameGate {
    skip: u64,
    counter: AtomicU64,
    busy: AtomicBool,
    stopped: AtomicBool,
    skipped: AtomicU64,
    dropped: AtomicU64,
    dispatched: AtomicU64,
}

impl FrameGate {
    /// Gate analysing one frame in every `skip` (0 is treated as 1)
    pub fn new(skip: u32) -> Arc<Self> {
        Arc::new(Self {
            skip: u64::from(skip.max(1)),
            counter: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
        })
    }

    pub fn offer(self: &Arc<Self>) -> GateDecision {
        if self.stopped.load(Ordering::Acquire) {
            return GateDecision::Stopped;
        }

        let n = self.counter.fetch_add(1, Ordering::AcqRel);
        if n % self.skip != 0 {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            trace!(frame = n, "frame skipped");
            return GateDecision::Skipped;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(frame = n, "frame dropped, analysis in flight");
            return GateDecision::Busy;
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        GateDecision::Dispatch(AnalysisPermit { gate: Arc::clone(self) })
    }

    /// Halt intake; the in-flight analysis (if any) still completes
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.stopped.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            offered: self.counter.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Holds the gate's busy flag; dropping it (on any path) frees the gate
#[derive(Debug)]
pub struct AnalysisPermit {
    gate: Arc<FrameGate>,
}

impl Drop for AnalysisPermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
