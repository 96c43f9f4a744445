//! Liveness session: owns every per-session engine and turns measurements
//! into the event stream
//!
//! Per frame: validity → anti-spoof → positioning → stability → sequencer.
//! Anti-spoof rejections become guidance and keep the frame away from the
//! stability filter and the sequencer; they only fail the attempt when the
//! session timeout elapses.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::core::antispoof::{AntiSpoofingEngine, SpoofVerdict};
use crate::core::positioning::PositioningEvaluator;
use crate::core::sequencer::{plan_challenges, ChallengeSequencer, SequencerStep};
use crate::core::stability::{StabilityFilter, StabilityTransition};
use crate::core::validity::FaceValidityFilter;
use crate::types::{
    BoundingBox, ChallengeType, FaceObservation, FrameGeometry, Guidance, LivenessError,
    LivenessEvent, LivenessResult, NoFaceReason, Progress, ResolvedFace, SequencerState,
    SessionSnapshot,
};

#[derive(Debug, Clone)]
pub struct LivenessSession {
    config: LivenessConfig,
    validity: FaceValidityFilter,
    anti_spoof: AntiSpoofingEngine,
    positioning: PositioningEvaluator,
    stability: StabilityFilter,
    sequencer: ChallengeSequencer,

    face_present: bool,
    last_no_face: Option<NoFaceReason>,
    last_guidance: Option<Guidance>,
    last_verdict: Option<SpoofVerdict>,
    current_box: Option<BoundingBox>,

    attempt: u32,
    session_started_ms: Option<u64>,
    attempt_started_ms: Option<u64>,
    frames_processed: u64,
    result: Option<LivenessResult>,
}

impl LivenessSession {
    /// Validate `config` and plan the challenge order (shuffled from OS entropy)
    pub fn new(config: LivenessConfig) -> Result<Self, LivenessError> {
        config.validate()?;
        let order = plan_challenges(
            &config.challenges,
            config.shuffle_challenges,
            &mut rand::thread_rng(),
        );
        Self::build(config, order)
    }

    /// Same as `new` with a deterministic shuffle
    pub fn with_seed(config: LivenessConfig, seed: u64) -> Result<Self, LivenessError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let order = plan_challenges(&config.challenges, config.shuffle_challenges, &mut rng);
        Self::build(config, order)
    }

    fn build(config: LivenessConfig, order: Vec<ChallengeType>) -> Result<Self, LivenessError> {
        Ok(Self {
            validity: FaceValidityFilter::new(config.validity.clone()),
            anti_spoof: AntiSpoofingEngine::new(config.anti_spoof.clone()),
            positioning: PositioningEvaluator::new(config.positioning.clone()),
            stability: StabilityFilter::new(config.stability.clone()),
            sequencer: ChallengeSequencer::new(&config, order)?,
            config,
            face_present: false,
            last_no_face: None,
            last_guidance: None,
            last_verdict: None,
            current_box: None,
            attempt: 1,
            session_started_ms: None,
            attempt_started_ms: None,
            frames_processed: 0,
            result: None,
        })
    }

    /// Leave IDLE; emits `initialized` and `detecting` once
    pub fn start(&mut self) -> Vec<LivenessEvent> {
        if self.sequencer.state() != SequencerState::Idle {
            return Vec::new();
        }
        self.sequencer.begin();
        info!(challenges = ?self.sequencer.challenges(), "liveness session started");
        vec![LivenessEvent::Initialized, LivenessEvent::Detecting]
    }

    /// Process one frame's detector output.
    ///
    /// The face is stamped with `now_ms`; detector-side timestamps on the
    /// observations are ignored.
    pub fn process(
        &mut self,
        faces: &[FaceObservation],
        frame: FrameGeometry,
        now_ms: u64,
    ) -> Vec<LivenessEvent> {
        let mut events = Vec::new();
        if !self.begin_frame(now_ms, &mut events) {
            return events;
        }
        match self.validity.check(faces) {
            Ok(mut face) => {
                face.timestamp_ms = now_ms;
                self.on_face(face, frame, now_ms, &mut events)
            }
            Err(reason) => self.on_no_face(reason, now_ms, &mut events),
        }
        events
    }

    /// Record a frame the adapter or detector could not analyze
    pub fn record_failure(&mut self, detail: impl Into<String>, now_ms: u64) -> Vec<LivenessEvent> {
        let mut events = Vec::new();
        if !self.begin_frame(now_ms, &mut events) {
            return events;
        }
        let reason = NoFaceReason::DetectionFailed { detail: detail.into() };
        self.on_no_face(reason, now_ms, &mut events);
        events
    }

    /// Stop the session at the caller's request
    pub fn cancel(&mut self) -> Vec<LivenessEvent> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.sequencer.cancel();
        info!(attempt = self.attempt, "liveness session cancelled");
        vec![LivenessEvent::Error { error: LivenessError::UserCancelled }]
    }

    /// Start-of-frame bookkeeping; false when the frame must not be analyzed
    fn begin_frame(&mut self, now_ms: u64, events: &mut Vec<LivenessEvent>) -> bool {
        if self.is_terminal() {
            return false;
        }
        events.extend(self.start());
        self.frames_processed += 1;
        self.session_started_ms.get_or_insert(now_ms);
        let attempt_started = *self.attempt_started_ms.get_or_insert(now_ms);

        let elapsed_ms = now_ms.saturating_sub(attempt_started);
        if elapsed_ms > self.config.session_timeout_ms {
            self.fail_attempt(elapsed_ms, now_ms, events);
            return false;
        }
        true
    }

    fn on_no_face(&mut self, reason: NoFaceReason, now_ms: u64, events: &mut Vec<LivenessEvent>) {
        self.current_box = None;
        self.face_present = false;
        self.last_guidance = None;
        if self.last_no_face.as_ref() != Some(&reason) {
            debug!(code = reason.code(), "no usable face");
            self.last_no_face = Some(reason.clone());
            events.push(LivenessEvent::NoFace { reason });
        }
        self.stability.update(false, now_ms);
        self.check_challenge_timeout(now_ms, events);
    }

    fn on_face(
        &mut self,
        face: ResolvedFace,
        frame: FrameGeometry,
        now_ms: u64,
        events: &mut Vec<LivenessEvent>,
    ) {
        self.current_box = Some(face.bounding_box);
        self.last_no_face = None;
        if !self.face_present {
            self.face_present = true;
            events.push(LivenessEvent::FaceDetected { bounding_box: face.bounding_box });
        }

        let verdict = self.anti_spoof.observe(&face);
        self.last_verdict = Some(verdict);
        self.check_challenge_timeout(now_ms, events);

        if let Some(reason) = verdict.reason {
            self.guide(Guidance::AntiSpoof { reason }, events);
            return;
        }

        let report = self
            .positioning
            .evaluate(&face, frame, self.sequencer.turn_active());
        let transition = self.stability.update(report.is_good(), now_ms);

        if !self.stability.is_stable() {
            let guidance = report
                .guidance(self.positioning.config())
                .unwrap_or(Guidance::HoldStill);
            self.guide(guidance, events);
            return;
        }
        if transition == StabilityTransition::BecameStable {
            self.last_guidance = None;
            events.push(LivenessEvent::Positioned);
        }

        for step in self.sequencer.on_positioned(&face, now_ms) {
            match step {
                SequencerStep::Started { challenge, index, total } => {
                    self.last_guidance = Some(Guidance::Perform { challenge });
                    events.push(LivenessEvent::challenge_in_progress(challenge, index, total));
                }
                SequencerStep::Completed { challenge, next, .. } => {
                    events.push(LivenessEvent::ChallengeCompleted { from: challenge, to: next });
                }
                SequencerStep::AllCompleted => self.finish_verified(verdict, now_ms, events),
            }
        }

        if let SequencerState::NeutralWait { .. } = self.sequencer.state() {
            self.guide(Guidance::ReturnToNeutral, events);
        }
    }

    /// Re-announce a challenge whose timer ran out; it restarts on the next positioned frame
    fn check_challenge_timeout(&mut self, now_ms: u64, events: &mut Vec<LivenessEvent>) {
        if let Some(timeout) = self.sequencer.check_timeout(now_ms) {
            let progress = self.sequencer.progress();
            events.push(LivenessEvent::challenge_in_progress(
                timeout.challenge,
                progress.completed,
                progress.total,
            ));
        }
    }

    /// Emit a positioning event when the instruction changes
    fn guide(&mut self, guidance: Guidance, events: &mut Vec<LivenessEvent>) {
        if self.last_guidance != Some(guidance) {
            self.last_guidance = Some(guidance);
            events.push(LivenessEvent::Positioning { guidance });
        }
    }

    fn finish_verified(&mut self, verdict: SpoofVerdict, now_ms: u64, events: &mut Vec<LivenessEvent>) {
        let result = LivenessResult::verified(
            self.sequencer.completed().to_vec(),
            self.sequencer.durations().to_vec(),
            self.total_duration(now_ms),
            verdict.score,
            self.attempt,
        );
        info!(
            confidence = result.confidence,
            duration_ms = result.total_duration_ms,
            attempts = result.attempt_count,
            "liveness verified"
        );
        self.result = Some(result.clone());
        events.push(LivenessEvent::Completed { result });
    }

    fn fail_attempt(&mut self, elapsed_ms: u64, now_ms: u64, events: &mut Vec<LivenessEvent>) {
        let error = match self.last_verdict.and_then(|v| v.reason) {
            Some(reason) => LivenessError::AntiSpoofingFailed {
                reason: format!("{}: {}", reason.code(), reason.description()),
            },
            None => LivenessError::Timeout { attempt: self.attempt, elapsed_ms },
        };
        warn!(attempt = self.attempt, code = error.code(), "attempt failed");
        events.push(LivenessEvent::Error { error });

        if self.attempt >= self.config.max_attempts {
            self.sequencer.fail();
            let result = LivenessResult::failed(
                self.sequencer.completed().to_vec(),
                self.sequencer.durations().to_vec(),
                self.total_duration(now_ms),
                self.attempt,
                LivenessError::MaxAttemptsExceeded { max_attempts: self.config.max_attempts },
            );
            self.result = Some(result.clone());
            events.push(LivenessEvent::Completed { result });
            return;
        }

        self.attempt += 1;
        self.anti_spoof.reset();
        self.stability.reset();
        self.sequencer.restart();
        self.face_present = false;
        self.last_no_face = None;
        self.last_guidance = None;
        self.last_verdict = None;
        self.current_box = None;
        self.attempt_started_ms = None;
        info!(attempt = self.attempt, "retrying liveness");
        events.push(LivenessEvent::Detecting);
    }

    fn total_duration(&self, now_ms: u64) -> u64 {
        self.session_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn is_terminal(&self) -> bool {
        self.sequencer.state().is_terminal()
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn challenges(&self) -> &[ChallengeType] {
        self.sequencer.challenges()
    }

    pub fn current_bounding_box(&self) -> Option<BoundingBox> {
        self.current_box
    }

    pub fn current_challenge(&self) -> Option<ChallengeType> {
        self.sequencer.current_challenge()
    }

    pub fn progress(&self) -> Progress {
        self.sequencer.progress()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn result(&self) -> Option<&LivenessResult> {
        self.result.as_ref()
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.sequencer.state(),
            current_challenge: self.current_challenge(),
            progress: self.progress(),
            bounding_box: self.current_box,
            guidance: self.last_guidance,
            stability: self.stability.state(),
            attempt: self.attempt,
            live: self.last_verdict.is_some_and(|v| v.is_live),
            frames_processed: self.frames_processed,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FRAME: FrameGeometry = FrameGeometry { width: 480.0, height: 640.0 };

    fn face(ts: u64, size: f64, yaw: f64) -> FaceObservation {
        let bbox = BoundingBox::new(240.0 - size / 2.0, 320.0 - size / 2.0, size, size);
        FaceObservation {
            smiling_probability: Some(0.1),
            left_eye_open_probability: Some(0.9),
            right_eye_open_probability: Some(0.9),
            head_euler_angle_x: Some(0.0),
            head_euler_angle_y: Some(yaw),
            head_euler_angle_z: Some(0.0),
            ..FaceObservation::bare(bbox, ts)
        }
    }

    fn session(config: LivenessConfig) -> LivenessSession {
        LivenessSession::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LivenessConfig { challenges: vec![], ..Default::default() };
        let err = LivenessSession::new(config).unwrap_err();
        assert_eq!(err.code(), "E007_CONFIGURATION");
    }

    #[test]
    fn test_start_emits_once() {
        let mut s = session(LivenessConfig::default());
        assert_eq!(s.start(), vec![LivenessEvent::Initialized, LivenessEvent::Detecting]);
        assert!(s.start().is_empty());
        assert_eq!(s.state(), SequencerState::WaitingForPositioning);
    }

    #[test]
    fn test_first_process_starts_session() {
        let mut s = session(LivenessConfig::default());
        let events = s.process(&[], FRAME, 0);
        assert_eq!(events[0], LivenessEvent::Initialized);
        assert_eq!(events[1], LivenessEvent::Detecting);
        assert_eq!(
            events[2],
            LivenessEvent::NoFace { reason: NoFaceReason::NoFaceDetected }
        );
    }

    #[test]
    fn test_no_face_events_deduplicated() {
        let mut s = session(LivenessConfig::default());
        s.start();
        assert_eq!(s.process(&[], FRAME, 0).len(), 1);
        assert!(s.process(&[], FRAME, 100).is_empty());

        let events = s.process(&[face(200, 200.0, 0.0)], FRAME, 200);
        assert!(matches!(events[0], LivenessEvent::FaceDetected { .. }));
        assert_eq!(s.current_bounding_box().map(|b| b.width), Some(200.0));

        let events = s.process(&[], FRAME, 300);
        assert_eq!(events.len(), 1);
        assert_eq!(s.current_bounding_box(), None);
    }

    #[test]
    fn test_anti_spoof_guidance_while_warming_up() {
        let mut s = session(LivenessConfig::default());
        s.start();
        let events = s.process(&[face(0, 200.0, 0.0)], FRAME, 0);
        assert_eq!(
            events[1],
            LivenessEvent::Positioning {
                guidance: Guidance::AntiSpoof { reason: crate::types::SpoofReason::InsufficientData }
            }
        );
        assert!(!s.snapshot().live);
        assert!(!s.snapshot().stability.stable);
    }

    #[test]
    fn test_faces_use_frame_clock() {
        let config = LivenessConfig { challenges: vec![ChallengeType::Smile], ..Default::default() };
        let mut s = session(config);
        s.start();
        // detector left every timestamp at zero
        let mut t = 0;
        while t <= 3000 {
            let size = if (t / 100) % 2 == 1 { 206.0 } else { 200.0 };
            let yaw = if (t / 100) % 2 == 1 { 3.0 } else { 0.0 };
            s.process(&[face(0, size, yaw)], FRAME, t);
            t += 100;
        }
        assert!(s.snapshot().live);
        assert_eq!(s.current_challenge(), Some(ChallengeType::Smile));
    }

    #[test]
    fn test_detector_failure_is_no_face() {
        let mut s = session(LivenessConfig::default());
        s.start();
        let events = s.record_failure("format rejected", 0);
        assert_eq!(
            events,
            vec![LivenessEvent::NoFace {
                reason: NoFaceReason::DetectionFailed { detail: "format rejected".into() }
            }]
        );
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_session_timeout_restarts_then_fails() {
        let config = LivenessConfig {
            session_timeout_ms: 3000,
            max_attempts: 2,
            ..Default::default()
        };
        let mut s = session(config);
        s.start();
        s.process(&[], FRAME, 0);

        let events = s.process(&[], FRAME, 3100);
        assert_eq!(
            events,
            vec![
                LivenessEvent::Error {
                    error: LivenessError::Timeout { attempt: 1, elapsed_ms: 3100 }
                },
                LivenessEvent::Detecting,
            ]
        );
        assert_eq!(s.attempt(), 2);
        assert_eq!(s.state(), SequencerState::WaitingForPositioning);

        s.process(&[], FRAME, 3200);
        let events = s.process(&[], FRAME, 6300);
        assert_eq!(events.len(), 2);
        match &events[1] {
            LivenessEvent::Completed { result } => {
                assert!(!result.verified);
                assert_eq!(result.attempt_count, 2);
                assert_eq!(
                    result.failure_reason,
                    Some(LivenessError::MaxAttemptsExceeded { max_attempts: 2 })
                );
            }
            other => panic!("expected completed, got {:?}", other),
        }
        assert_eq!(s.state(), SequencerState::Error);
        assert!(s.result().is_some());
        assert!(s.process(&[], FRAME, 6400).is_empty());
    }

    #[test]
    fn test_timeout_while_spoofed_reports_anti_spoofing() {
        let config = LivenessConfig {
            session_timeout_ms: 1000,
            max_attempts: 3,
            ..Default::default()
        };
        let mut s = session(config);
        s.start();
        // constant face: never enough motion
        for t in 0..=10 {
            s.process(&[face(t * 100, 200.0, 0.0)], FRAME, t * 100);
        }
        let events = s.process(&[face(1200, 200.0, 0.0)], FRAME, 1200);
        match &events[0] {
            LivenessEvent::Error { error } => assert_eq!(error.code(), "E006_ANTI_SPOOFING"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel() {
        let mut s = session(LivenessConfig::default());
        s.start();
        assert_eq!(
            s.cancel(),
            vec![LivenessEvent::Error { error: LivenessError::UserCancelled }]
        );
        assert_eq!(s.state(), SequencerState::Cancelled);
        assert!(s.cancel().is_empty());
        assert!(s.process(&[], FRAME, 0).is_empty());
    }

    #[test]
    fn test_seeded_sessions_share_order() {
        let config = LivenessConfig {
            challenges: ChallengeType::ALL.to_vec(),
            shuffle_challenges: true,
            ..Default::default()
        };
        let a = LivenessSession::with_seed(config.clone(), 42).unwrap();
        let b = LivenessSession::with_seed(config, 42).unwrap();
        assert_eq!(a.challenges(), b.challenges());
        assert!(a.challenges()[0].is_easy());
    }
}
