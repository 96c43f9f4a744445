//! Core modules for liveguard

pub mod adapter;
pub mod antispoof;
pub mod api;
pub mod blink;
pub mod coords;
pub mod detector;
pub mod gate;
pub mod orchestrator;
pub mod positioning;
pub mod sequencer;
pub mod session;
pub mod stability;
pub mod validity;

pub use adapter::{FormatFallbackAdapter, ImageAdapter};
pub use antispoof::{AntiSpoofingEngine, SpoofVerdict};
pub use api::{create_router, run_server};
pub use blink::BlinkDetector;
pub use coords::map_to_display;
pub use detector::{CameraSource, FaceDetector, FrameSink, ManualCamera, ScriptedDetector};
pub use gate::{AnalysisPermit, FrameGate, GateDecision, GateStats};
pub use orchestrator::LivenessOrchestrator;
pub use positioning::{PositioningEvaluator, PositioningReport};
pub use sequencer::{plan_challenges, ChallengeSequencer, ChallengeTimeout, SequencerStep};
pub use session::LivenessSession;
pub use stability::{StabilityFilter, StabilityTransition};
pub use validity::FaceValidityFilter;
