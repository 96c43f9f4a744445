//! Collaborator traits: camera stream and face detector
//!
//! Also ships scripted implementations used by the CLI demo and the tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::types::{DetectorInput, FaceObservation, LivenessError, RawFrame};

/// Face-measurement detector. `detect` is the pipeline's only suspension point.
pub trait FaceDetector: Send {
    /// Smoke test run once before any frame; failure is fatal
    fn warm_up(&mut self) -> impl Future<Output = Result<(), LivenessError>> + Send;

    fn detect(
        &mut self,
        input: &DetectorInput,
    ) -> impl Future<Output = Result<Vec<FaceObservation>, LivenessError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), LivenessError>> + Send;
}

/// Receives frames from the camera thread
pub trait FrameSink: Send + Sync {
    fn submit(&self, frame: RawFrame);
}

pub trait CameraSource: Send {
    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), LivenessError>;
    fn stop(&mut self) -> Result<(), LivenessError>;
}

// =============================================================================
// SCRIPTED DETECTOR
// =============================================================================

/// Detector answering from a queue of prepared results (empty queue: no faces)
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<FaceObservation>, LivenessError>>,
    warm_up_error: Option<LivenessError>,
    detect_calls: usize,
    closed: bool,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Result<Vec<FaceObservation>, LivenessError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Detector whose warm-up fails with `error`
    pub fn failing_warm_up(error: LivenessError) -> Self {
        Self {
            warm_up_error: Some(error),
            ..Default::default()
        }
    }

    pub fn push(&mut self, result: Result<Vec<FaceObservation>, LivenessError>) {
        self.script.push_back(result);
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FaceDetector for ScriptedDetector {
    async fn warm_up(&mut self) -> Result<(), LivenessError> {
        match self.warm_up_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn detect(&mut self, input: &DetectorInput) -> Result<Vec<FaceObservation>, LivenessError> {
        self.detect_calls += 1;
        debug!(format = %input.format, call = self.detect_calls, "scripted detect");
        tokio::task::yield_now().await;
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn close(&mut self) -> Result<(), LivenessError> {
        self.closed = true;
        Ok(())
    }
}

// =============================================================================
// MANUAL CAMERA
// =============================================================================

#[derive(Default)]
struct CameraState {
    sink: Option<Arc<dyn FrameSink>>,
    start_error: Option<LivenessError>,
    stop_error: Option<LivenessError>,
    stop_calls: u32,
}

/// Camera driven by the caller: `push` delivers a frame while started.
/// Clones share the same stream.
#[derive(Clone, Default)]
pub struct ManualCamera {
    state: Arc<Mutex<CameraState>>,
}

impl ManualCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera whose `start` fails with `error`
    pub fn failing_start(error: LivenessError) -> Self {
        let camera = Self::default();
        camera.lock().start_error = Some(error);
        camera
    }

    /// Camera whose `stop` fails with `error`
    pub fn failing_stop(error: LivenessError) -> Self {
        let camera = Self::default();
        camera.lock().stop_error = Some(error);
        camera
    }

    /// Deliver a frame; false when the stream is not running
    pub fn push(&self, frame: RawFrame) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink.submit(frame);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().sink.is_some()
    }

    pub fn stop_calls(&self) -> u32 {
        self.lock().stop_calls
    }

    fn lock(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CameraSource for ManualCamera {
    fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<(), LivenessError> {
        let mut state = self.lock();
        if let Some(err) = state.start_error.take() {
            return Err(err);
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), LivenessError> {
        let mut state = self.lock();
        state.stop_calls += 1;
        state.sink = None;
        match state.stop_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
