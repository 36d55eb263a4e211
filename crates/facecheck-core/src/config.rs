//! Tunable thresholds for the verification flow.
//!
//! Every constant here was picked empirically against a mirrored webcam
//! preview. None of them is a hard invariant; deployments calibrate them
//! through the runtime config file or `FACECHECK_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Sign convention applied to the raw yaw estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawConvention {
    /// Preview is mirrored: positive yaw means the head turned right as the
    /// viewer sees it on screen.
    #[default]
    Mirrored,
    /// Camera-space sign, no inversion.
    Raw,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("left_yaw_threshold must be negative (got {0})")]
    LeftYawNotNegative(f32),
    #[error("right_yaw_threshold must be positive (got {0})")]
    RightYawNotPositive(f32),
    #[error("acceptable_yaw ({acceptable}) must be below extreme_yaw ({extreme})")]
    YawBand { acceptable: f32, extreme: f32 },
    #[error("face distance band is empty: min {min} >= max {max}")]
    DistanceBand { min: f32, max: f32 },
    #[error("acceptable distance band [{min}, {max}] must enclose the normal band")]
    AcceptableDistanceBand { min: f32, max: f32 },
    #[error("extreme distance band [{min}, {max}] must enclose the acceptable band")]
    ExtremeDistanceBand { min: f32, max: f32 },
    #[error(
        "center offsets must satisfy max ({normal}) <= acceptable ({acceptable}) < extreme ({extreme})"
    )]
    CenterOffsetBand {
        normal: f32,
        acceptable: f32,
        extreme: f32,
    },
    #[error("bad_lighting_frames must be at least 1")]
    LightingDebounce,
    #[error("hold_prompt_after_ms ({prompt}) must be below hold_duration_ms ({hold})")]
    HoldPrompt { prompt: u64, hold: u64 },
}

/// Thresholds consulted by the geometry, policy, and sequencer modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub yaw_convention: YawConvention,
    /// Yaw (degrees) below which the LEFT step counts as done.
    pub left_yaw_threshold: f32,
    /// Yaw (degrees) above which the RIGHT step counts as done.
    pub right_yaw_threshold: f32,
    /// Largest |yaw| still accepted while holding the final frontal pose.
    pub acceptable_yaw: f32,
    /// |yaw| beyond which a running hold is reset.
    pub extreme_yaw: f32,
    pub min_face_distance: f32,
    pub max_face_distance: f32,
    pub max_center_offset: f32,
    /// Looser framing band the hold gate accepts once in CENTER. Sits
    /// between the normal band above and the extreme band below.
    pub acceptable_min_face_distance: f32,
    pub acceptable_max_face_distance: f32,
    pub acceptable_center_offset: f32,
    pub extreme_min_face_distance: f32,
    pub extreme_max_face_distance: f32,
    pub extreme_center_offset: f32,
    /// Mean luminance (0-255) below which a frame counts as dark.
    pub min_lighting: f32,
    /// Consecutive dark frames before lighting blocks the hold.
    pub bad_lighting_frames: u32,
    pub hold_duration_ms: u64,
    /// Delay before the one-time "hold still" prompt.
    pub hold_prompt_after_ms: u64,
    /// Reject holds whose landmarks barely move (printed photo).
    pub static_check: bool,
    /// Minimum mean nose-tip displacement between frames, in normalized
    /// frame units, for the static check to pass.
    pub min_landmark_motion: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            yaw_convention: YawConvention::Mirrored,
            left_yaw_threshold: -30.0,
            right_yaw_threshold: 30.0,
            acceptable_yaw: 20.0,
            extreme_yaw: 35.0,
            min_face_distance: 0.15,
            max_face_distance: 0.75,
            max_center_offset: 0.25,
            acceptable_min_face_distance: 0.12,
            acceptable_max_face_distance: 0.82,
            acceptable_center_offset: 0.32,
            extreme_min_face_distance: 0.08,
            extreme_max_face_distance: 0.90,
            extreme_center_offset: 0.40,
            min_lighting: 40.0,
            bad_lighting_frames: 5,
            hold_duration_ms: 2000,
            hold_prompt_after_ms: 1000,
            static_check: false,
            min_landmark_motion: 0.0005,
        }
    }
}

impl Thresholds {
    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }

    pub fn hold_prompt_after(&self) -> Duration {
        Duration::from_millis(self.hold_prompt_after_ms)
    }

    /// Check that the bands nest the way the hold gate assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.left_yaw_threshold >= 0.0 {
            return Err(ConfigError::LeftYawNotNegative(self.left_yaw_threshold));
        }
        if self.right_yaw_threshold <= 0.0 {
            return Err(ConfigError::RightYawNotPositive(self.right_yaw_threshold));
        }
        if self.acceptable_yaw >= self.extreme_yaw {
            return Err(ConfigError::YawBand {
                acceptable: self.acceptable_yaw,
                extreme: self.extreme_yaw,
            });
        }
        if self.min_face_distance >= self.max_face_distance {
            return Err(ConfigError::DistanceBand {
                min: self.min_face_distance,
                max: self.max_face_distance,
            });
        }
        if self.acceptable_min_face_distance > self.min_face_distance
            || self.acceptable_max_face_distance < self.max_face_distance
        {
            return Err(ConfigError::AcceptableDistanceBand {
                min: self.acceptable_min_face_distance,
                max: self.acceptable_max_face_distance,
            });
        }
        if self.extreme_min_face_distance > self.acceptable_min_face_distance
            || self.extreme_max_face_distance < self.acceptable_max_face_distance
        {
            return Err(ConfigError::ExtremeDistanceBand {
                min: self.extreme_min_face_distance,
                max: self.extreme_max_face_distance,
            });
        }
        if self.acceptable_center_offset < self.max_center_offset
            || self.extreme_center_offset <= self.acceptable_center_offset
        {
            return Err(ConfigError::CenterOffsetBand {
                normal: self.max_center_offset,
                acceptable: self.acceptable_center_offset,
                extreme: self.extreme_center_offset,
            });
        }
        if self.bad_lighting_frames == 0 {
            return Err(ConfigError::LightingDebounce);
        }
        if self.hold_prompt_after_ms >= self.hold_duration_ms {
            return Err(ConfigError::HoldPrompt {
                prompt: self.hold_prompt_after_ms,
                hold: self.hold_duration_ms,
            });
        }
        Ok(())
    }
}
