//! Classification request/response types and the caller-facing outcome.
//!
//! The classifier itself is external. The sequencer only hands out a
//! [`CaptureTicket`] when the hold gate fires and later accepts the result
//! for that ticket.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::geometry::{CenterOffset, GeometrySnapshot};

/// Model output. `confidence` is on the model's 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub gender: String,
    pub confidence: f32,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("camera is not ready")]
    CameraNotReady,
    #[error("no frame available to classify")]
    NoFrame,
    #[error("classifier is unavailable")]
    Unavailable,
    #[error("classification failed: {0}")]
    Model(String),
}

/// Identifies one classification request within a sequencer's lifetime.
/// Tickets are never reused, so a late result can always be told apart from
/// the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureTicket(pub(crate) u64);

impl CaptureTicket {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CaptureTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture#{}", self.0)
    }
}

/// Successful verification, as handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub gender: String,
    /// 0-1 scale.
    pub confidence: f32,
    pub face_distance: f32,
    pub center_offset: CenterOffset,
}

impl VerificationResult {
    pub fn new(classification: Classification, geometry: &GeometrySnapshot) -> Self {
        Self {
            success: true,
            gender: classification.gender,
            confidence: (classification.confidence / 100.0).clamp(0.0, 1.0),
            face_distance: geometry.face_distance,
            center_offset: geometry.center_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub success: bool,
    pub cancelled: bool,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self {
            success: false,
            cancelled: true,
        }
    }
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Verified(VerificationResult),
    Cancelled(Cancellation),
}

impl Outcome {
    pub fn cancelled() -> Self {
        Outcome::Cancelled(Cancellation::default())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Verified(_))
    }
}
