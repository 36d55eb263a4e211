//! Face-verification liveness flow.
//!
//! A user proves liveness by turning left, then right, then holding a steady
//! frontal pose; the held frame is then handed to an external classifier.
//! This crate holds the pure parts: landmark geometry, the framing policy, the
//! hold gate and the challenge [`Sequencer`]. Frame capture, speech, and the
//! classifier live in `facecheck-runtime`.

pub mod classify;
pub mod config;
pub mod geometry;
pub mod hold;
pub mod narration;
pub mod policy;
pub mod sequencer;
pub mod stability;

pub use classify::{
    Cancellation, CaptureTicket, Classification, ClassifyError, Outcome, VerificationResult,
};
pub use config::{ConfigError, Thresholds, YawConvention};
pub use geometry::{CenterOffset, GeometrySnapshot, LandmarkSet, Observation, Point};
pub use sequencer::{ChallengeState, Effect, Sequencer};

#[cfg(test)]
pub(crate) mod testutil {
    use std::time::Duration;

    use crate::geometry::{
        CenterOffset, GeometrySnapshot, LandmarkSet, Observation, Point, CHIN, FOREHEAD,
        LEFT_EAR, NOSE_TIP, RIGHT_EAR,
    };

    /// Centered face, distance 0.35, turned `yaw` degrees in the mirrored
    /// convention.
    pub fn face_with_yaw(yaw: f32) -> LandmarkSet {
        let mut points = vec![Point::new(0.5, 0.5); 468];
        points[LEFT_EAR] = Point::new(0.35, 0.5);
        points[RIGHT_EAR] = Point::new(0.65, 0.5);
        points[FOREHEAD] = Point::new(0.5, 0.3);
        points[CHIN] = Point::new(0.5, 0.7);
        points[NOSE_TIP] = Point::new(0.5 - yaw.to_radians().sin() * 0.15, 0.5);
        LandmarkSet::new(points)
    }

    pub fn good_geometry(yaw: f32) -> GeometrySnapshot {
        GeometrySnapshot {
            yaw,
            lighting: 128.0,
            face_distance: 0.35,
            center_offset: CenterOffset { x: 0.02, y: 0.03 },
        }
    }

    pub fn obs(at_ms: u64, geometry: GeometrySnapshot) -> Observation {
        Observation::new(Duration::from_millis(at_ms), geometry)
    }
}
