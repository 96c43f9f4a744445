//! Core types for liveguard

mod challenge;
mod error;
mod event;
mod frame;
mod history;
mod observation;
mod reason;
mod result;
mod state;

pub use challenge::{ChallengeDuration, ChallengeType};
pub use error::LivenessError;
pub use event::{LivenessEvent, StampedEvent};
pub use frame::{DetectorInput, PixelFormat, Plane, RawFrame};
pub use history::{FaceHistory, FaceHistoryEntry};
pub use observation::{BoundingBox, FaceObservation, FrameGeometry, ResolvedFace};
pub use reason::{Guidance, NoFaceReason, SpoofReason};
pub use result::{LivenessResult, Progress, SessionSnapshot};
pub use state::{SequencerState, StabilityState};
