//! Static-frame detection over the hold window.
//!
//! A photograph held up to the camera keeps its landmarks nearly fixed while
//! the user is asked to hold still. A live face still drifts by a small but
//! measurable amount between frames. The hold gate samples the nose tip while
//! the timer runs and consults this check before firing.
//!
//! Does not block replayed video or masks.

use std::collections::VecDeque;

use crate::geometry::Point;

/// Result of a landmark motion check.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionResult {
    /// True when the samples moved enough to look like a live face.
    pub is_live: bool,
    /// Mean displacement between consecutive samples (normalized units).
    pub mean_displacement: f32,
    pub pairs_analysed: usize,
}

/// Mean frame-to-frame displacement of `samples` compared with `min_motion`.
///
/// Fewer than two samples cannot be judged and pass through as live.
pub fn check_landmark_motion(samples: &[Point], min_motion: f32) -> MotionResult {
    if samples.len() < 2 {
        return MotionResult {
            is_live: true,
            mean_displacement: 0.0,
            pairs_analysed: 0,
        };
    }

    let total: f32 = samples
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum();
    let pairs = samples.len() - 1;
    let mean = total / pairs as f32;

    MotionResult {
        is_live: mean >= min_motion,
        mean_displacement: mean,
        pairs_analysed: pairs,
    }
}

/// Bounded buffer of anchor samples collected while a hold is running.
#[derive(Debug, Default)]
pub(crate) struct MotionWindow {
    samples: VecDeque<Point>,
}

/// Frames kept per hold; about four seconds at 30 fps.
const MAX_SAMPLES: usize = 120;

impl MotionWindow {
    pub(crate) fn push(&mut self, point: Point) {
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(point);
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    pub(crate) fn check(&mut self, min_motion: f32) -> MotionResult {
        check_landmark_motion(self.samples.make_contiguous(), min_motion)
    }
}
