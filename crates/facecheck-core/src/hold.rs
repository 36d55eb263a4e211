//! Hold-and-capture gate for the final frontal pose.
//!
//! The gate only resets on *extreme* failures. Minor wobble, a single dark
//! frame, or a slightly off-center face leaves a running timer alone; the
//! gate simply waits for an acceptable frame before firing.
//!
//! "Acceptable" framing is looser than the positioning policy used for the
//! turn steps: the `acceptable_*` bands sit between the policy bands and the
//! extreme bands.

use std::time::Duration;

use crate::config::Thresholds;
use crate::geometry::{GeometrySnapshot, Observation};
use crate::stability::MotionWindow;

/// Why a hold was interrupted or could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    NoFace,
    TooDark,
    TurnedAway,
    TooFar,
    TooClose,
    OffCenter,
    StaticImage,
}

impl ResetReason {
    pub fn prompt(self) -> &'static str {
        match self {
            ResetReason::NoFace => "We lost your face. Please look at the camera",
            ResetReason::TooDark => "It is too dark. Please move somewhere brighter",
            ResetReason::TurnedAway => "Please face the camera directly",
            ResetReason::TooFar => "Please move closer to the camera",
            ResetReason::TooClose => "Please move a bit farther away",
            ResetReason::OffCenter => "Please center your face in the frame",
            ResetReason::StaticImage => "Please look at the camera naturally",
        }
    }
}

/// What the gate decided for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldStep {
    /// No timer running and the frame is not acceptable yet.
    Waiting,
    /// Timer started on this frame.
    Started,
    /// Timer running, not yet due.
    Holding { elapsed: Duration },
    /// Timer passed the prompt delay; issued at most once per hold.
    PromptStill,
    /// Extreme failure while no timer was running.
    Blocked(ResetReason),
    /// Extreme failure cleared a running timer.
    Reset(ResetReason),
    /// Held long enough. Carries the frozen geometry.
    Fire(GeometrySnapshot),
}

#[derive(Debug, Default)]
pub struct HoldGate {
    started_at: Option<Duration>,
    prompted: bool,
    dark_streak: u32,
    motion: MotionWindow,
}

impl HoldGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_at(&self) -> Option<Duration> {
        self.started_at
    }

    pub fn dark_streak(&self) -> u32 {
        self.dark_streak
    }

    /// Drop the timer, the prompt flag, the lighting debounce and the
    /// motion samples.
    pub fn clear(&mut self) {
        self.clear_timer();
        self.dark_streak = 0;
    }

    pub fn observe(&mut self, obs: &Observation, thresholds: &Thresholds) -> HoldStep {
        let Some(geometry) = obs.geometry else {
            return self.fail(ResetReason::NoFace);
        };

        if geometry.lighting < thresholds.min_lighting {
            self.dark_streak = self.dark_streak.saturating_add(1);
        } else {
            self.dark_streak = 0;
        }

        if let Some(reason) = extreme_failure(&geometry, self.dark_streak, thresholds) {
            return self.fail(reason);
        }

        let acceptable = is_acceptable(&geometry, thresholds);

        // A camera stream restart rewinds the frame clock.
        if self.started_at.is_some_and(|start| obs.at < start) {
            tracing::debug!(at_ms = obs.at.as_millis() as u64, "frame clock rewound, hold restarted");
            self.clear_timer();
        }

        let Some(start) = self.started_at else {
            if !acceptable {
                return HoldStep::Waiting;
            }
            self.started_at = Some(obs.at);
            self.record_anchor(obs);
            tracing::debug!(at_ms = obs.at.as_millis() as u64, "hold timer started");
            return HoldStep::Started;
        };

        self.record_anchor(obs);
        let elapsed = obs.at.saturating_sub(start);

        if !acceptable {
            return HoldStep::Holding { elapsed };
        }

        if elapsed >= thresholds.hold_duration() {
            if thresholds.static_check {
                let motion = self.motion.check(thresholds.min_landmark_motion);
                if !motion.is_live {
                    tracing::warn!(
                        mean_displacement = motion.mean_displacement,
                        pairs = motion.pairs_analysed,
                        "hold rejected: landmarks static"
                    );
                    return self.fail(ResetReason::StaticImage);
                }
            }
            return HoldStep::Fire(geometry);
        }

        if elapsed >= thresholds.hold_prompt_after() && !self.prompted {
            self.prompted = true;
            return HoldStep::PromptStill;
        }

        HoldStep::Holding { elapsed }
    }

    fn fail(&mut self, reason: ResetReason) -> HoldStep {
        if self.started_at.is_some() {
            tracing::debug!(?reason, "hold timer reset");
            self.clear_timer();
            HoldStep::Reset(reason)
        } else {
            HoldStep::Blocked(reason)
        }
    }

    fn clear_timer(&mut self) {
        self.started_at = None;
        self.prompted = false;
        self.motion.clear();
    }

    fn record_anchor(&mut self, obs: &Observation) {
        if let Some(anchor) = obs.anchor {
            self.motion.push(anchor);
        }
    }
}

fn extreme_failure(
    g: &GeometrySnapshot,
    dark_streak: u32,
    t: &Thresholds,
) -> Option<ResetReason> {
    if dark_streak >= t.bad_lighting_frames {
        Some(ResetReason::TooDark)
    } else if g.yaw.abs() > t.extreme_yaw {
        Some(ResetReason::TurnedAway)
    } else if g.face_distance < t.extreme_min_face_distance {
        Some(ResetReason::TooFar)
    } else if g.face_distance > t.extreme_max_face_distance {
        Some(ResetReason::TooClose)
    } else if g.center_offset.x > t.extreme_center_offset
        || g.center_offset.y > t.extreme_center_offset
    {
        Some(ResetReason::OffCenter)
    } else {
        None
    }
}

/// Framing inside the acceptable bands, a roughly frontal head, and a lit
/// frame.
fn is_acceptable(g: &GeometrySnapshot, t: &Thresholds) -> bool {
    (t.acceptable_min_face_distance..=t.acceptable_max_face_distance).contains(&g.face_distance)
        && g.center_offset.x <= t.acceptable_center_offset
        && g.center_offset.y <= t.acceptable_center_offset
        && g.yaw.abs() <= t.acceptable_yaw
        && g.lighting >= t.min_lighting
}
