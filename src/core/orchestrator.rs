//! Liveness orchestrator: camera → gate → adapter → detector → session
//!
//! The camera pushes frames synchronously into a `FrameSink`. The sink runs
//! the gate and hands dispatched frames (with their permit) to the analysis
//! loop over a one-slot channel. The permit is held until the frame's events
//! are published, so at most one analysis is ever in flight.
//!
//! The sink owns the only sender. Once the camera drops its sink (on stop)
//! the loop drains what is queued and `step` yields `None`.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, trace, warn};

use crate::core::adapter::ImageAdapter;
use crate::core::detector::{CameraSource, FaceDetector, FrameSink};
use crate::core::gate::{AnalysisPermit, FrameGate, GateDecision, GateStats};
use crate::core::session::LivenessSession;
use crate::types::{
    FrameGeometry, LivenessError, LivenessEvent, LivenessResult, RawFrame, SessionSnapshot,
    StampedEvent,
};

/// Broadcast buffer for subscribers that fall behind
const EVENT_CHANNEL_CAPACITY: usize = 256;

type Dispatched = (RawFrame, AnalysisPermit);

struct GateSink {
    gate: Arc<FrameGate>,
    frames: mpsc::Sender<Dispatched>,
}

impl FrameSink for GateSink {
    fn submit(&self, frame: RawFrame) {
        if let GateDecision::Dispatch(permit) = self.gate.offer() {
            // the permit travels with the frame; a closed loop drops both
            if self.frames.try_send((frame, permit)).is_err() {
                trace!("analysis loop gone, frame discarded");
            }
        }
    }
}

pub struct LivenessOrchestrator<D: FaceDetector> {
    detector: D,
    adapter: Box<dyn ImageAdapter>,
    camera: Box<dyn CameraSource>,
    session: LivenessSession,
    gate: Arc<FrameGate>,
    frames_tx: Option<mpsc::Sender<Dispatched>>,
    frames_rx: mpsc::Receiver<Dispatched>,
    events: broadcast::Sender<StampedEvent>,
    last_frame_ms: u64,
}

impl<D: FaceDetector> LivenessOrchestrator<D> {
    pub fn new(
        detector: D,
        adapter: Box<dyn ImageAdapter>,
        camera: Box<dyn CameraSource>,
        session: LivenessSession,
    ) -> Self {
        let gate = FrameGate::new(session.config().frame_skip);
        let (frames_tx, frames_rx) = mpsc::channel(1);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            detector,
            adapter,
            camera,
            session,
            gate,
            frames_tx: Some(frames_tx),
            frames_rx,
            events,
            last_frame_ms: 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StampedEvent> {
        self.events.subscribe()
    }

    /// Warm up the detector and start the camera; failures are fatal.
    /// The frame channel is handed to the camera, so this succeeds once.
    pub async fn initialize(&mut self) -> Result<Vec<LivenessEvent>, LivenessError> {
        let Some(frames) = self.frames_tx.take() else {
            return Err(LivenessError::Camera { detail: "orchestrator already initialized".into() });
        };
        if let Err(err) = self.detector.warm_up().await {
            error!(code = err.code(), %err, "detector warm-up failed");
            return Err(err);
        }

        let sink = Arc::new(GateSink { gate: Arc::clone(&self.gate), frames });
        if let Err(err) = self.camera.start(sink) {
            error!(code = err.code(), %err, "camera start failed");
            return Err(err);
        }

        info!(skip = self.gate.skip(), "orchestrator initialized");
        let events = self.session.start();
        self.publish(&events, 0);
        Ok(events)
    }

    /// Wait for the next dispatched frame and analyze it.
    /// `None` before `initialize`, once the session is terminal, or once
    /// the camera has stopped.
    pub async fn step(&mut self) -> Option<Vec<LivenessEvent>> {
        if self.session.is_terminal() || self.frames_tx.is_some() {
            return None;
        }
        let (frame, permit) = self.frames_rx.recv().await?;
        Some(self.analyze_frame(frame, permit).await)
    }

    /// Analyze frames until the session finishes or the camera stops.
    /// `None` when the camera stopped first.
    pub async fn run(&mut self) -> Option<LivenessResult> {
        while self.step().await.is_some() {}
        self.session.result().cloned()
    }

    /// Full per-frame pipeline; the permit is released when this returns
    pub async fn analyze_frame(&mut self, frame: RawFrame, permit: AnalysisPermit) -> Vec<LivenessEvent> {
        let now_ms = frame.timestamp_ms;
        self.last_frame_ms = now_ms;

        let events = match self.adapter.convert(&frame) {
            Err(err) => self.session.record_failure(err.to_string(), now_ms),
            Ok(input) => match self.detector.detect(&input).await {
                Ok(faces) => {
                    let geometry = FrameGeometry::new(f64::from(frame.width), f64::from(frame.height));
                    self.session.process(&faces, geometry, now_ms)
                }
                Err(err) => {
                    warn!(code = err.code(), %err, "detector failed on frame");
                    self.session.record_failure(err.to_string(), now_ms)
                }
            },
        };

        self.publish(&events, now_ms);
        if self.session.is_terminal() {
            self.gate.stop();
        }
        drop(permit);
        events
    }

    /// Halt intake; session state is kept
    pub fn stop(&self) {
        self.gate.stop();
    }

    pub fn resume(&self) {
        if !self.session.is_terminal() {
            self.gate.resume();
        }
    }

    pub fn cancel(&mut self) -> Vec<LivenessEvent> {
        self.gate.stop();
        let events = self.session.cancel();
        self.publish(&events, self.last_frame_ms);
        events
    }

    /// Stop the camera, then close the detector. Failures are only logged.
    pub async fn dispose(mut self) -> LivenessSession {
        self.gate.stop();
        if let Err(err) = self.camera.stop() {
            warn!(code = err.code(), %err, "camera stop failed during dispose");
        }
        if let Err(err) = self.detector.close().await {
            warn!(code = err.code(), %err, "detector close failed during dispose");
        }
        info!(stats = ?self.gate.stats(), "orchestrator disposed");
        self.session
    }

    pub fn session(&self) -> &LivenessSession {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    fn publish(&self, events: &[LivenessEvent], frame_ms: u64) {
        for event in events {
            // no subscribers is fine
            let _ = self.events.send(StampedEvent::new(event.clone(), frame_ms));
        }
    }
}
