//! Head pose and framing measurements from face-mesh landmarks.
//!
//! Landmarks are in normalized frame coordinates (0..1 on both axes) using
//! the 468-point face-mesh indexing. All functions are pure; a missing
//! landmark yields zero rather than an error, because "no face" is handled
//! upstream as an absent [`GeometrySnapshot`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::YawConvention;

/// Nose tip.
pub const NOSE_TIP: usize = 1;
/// Top of the forehead.
pub const FOREHEAD: usize = 10;
/// Bottom of the chin.
pub const CHIN: usize = 152;
/// Cheek/ear edge on the image-left side.
pub const LEFT_EAR: usize = 234;
/// Cheek/ear edge on the image-right side.
pub const RIGHT_EAR: usize = 454;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Face-mesh vertices for a single frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Point>);

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Absolute per-axis distance between the face center and the frame center.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CenterOffset {
    pub x: f32,
    pub y: f32,
}

/// Estimate left/right head rotation in degrees.
///
/// The nose tip's horizontal offset from the ear midpoint, as a fraction of
/// half the ear span, is treated as the sine of the yaw angle.
pub fn compute_yaw(landmarks: &LandmarkSet, convention: YawConvention) -> f32 {
    let (Some(left), Some(right), Some(nose)) = (
        landmarks.get(LEFT_EAR),
        landmarks.get(RIGHT_EAR),
        landmarks.get(NOSE_TIP),
    ) else {
        return 0.0;
    };

    let half_span = (right.x - left.x).abs() / 2.0;
    if half_span <= f32::EPSILON {
        return 0.0;
    }

    let mid_x = (left.x + right.x) / 2.0;
    let ratio = ((nose.x - mid_x) / half_span).clamp(-1.0, 1.0);
    let raw = ratio.asin().to_degrees();

    match convention {
        YawConvention::Mirrored => -raw,
        YawConvention::Raw => raw,
    }
}

/// Mean of the R, G and B channel means over an RGBA buffer.
///
/// Scans every pixel. Returns 0 when the buffer is empty or shorter than
/// `width * height * 4` bytes.
pub fn compute_lighting(pixels: &[u8], width: u32, height: u32) -> f32 {
    let count = width as usize * height as usize;
    if count == 0 || pixels.len() < count * 4 {
        return 0.0;
    }

    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for px in pixels.chunks_exact(4).take(count) {
        r += u64::from(px[0]);
        g += u64::from(px[1]);
        b += u64::from(px[2]);
    }

    let n = count as f64;
    ((r as f64 / n + g as f64 / n + b as f64 / n) / 3.0) as f32
}

/// Relative face size: mean of ear-to-ear width and forehead-to-chin height.
pub fn compute_face_distance(landmarks: &LandmarkSet) -> f32 {
    let (Some(left), Some(right), Some(top), Some(bottom)) = (
        landmarks.get(LEFT_EAR),
        landmarks.get(RIGHT_EAR),
        landmarks.get(FOREHEAD),
        landmarks.get(CHIN),
    ) else {
        return 0.0;
    };

    let width = (right.x - left.x).abs();
    let height = (bottom.y - top.y).abs();
    (width + height) / 2.0
}

pub fn compute_face_center_offset(landmarks: &LandmarkSet) -> CenterOffset {
    let (Some(left), Some(right), Some(top), Some(bottom)) = (
        landmarks.get(LEFT_EAR),
        landmarks.get(RIGHT_EAR),
        landmarks.get(FOREHEAD),
        landmarks.get(CHIN),
    ) else {
        return CenterOffset::default();
    };

    let cx = (left.x + right.x) / 2.0;
    let cy = (top.y + bottom.y) / 2.0;
    CenterOffset {
        x: (cx - 0.5).abs(),
        y: (cy - 0.5).abs(),
    }
}

/// Per-frame geometry. Only exists when a face was detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub yaw: f32,
    pub lighting: f32,
    pub face_distance: f32,
    pub center_offset: CenterOffset,
}

impl GeometrySnapshot {
    pub fn measure(landmarks: &LandmarkSet, lighting: f32, convention: YawConvention) -> Self {
        Self {
            yaw: compute_yaw(landmarks, convention),
            lighting,
            face_distance: compute_face_distance(landmarks),
            center_offset: compute_face_center_offset(landmarks),
        }
    }
}

/// One sampled frame as seen by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Offset from the start of the frame stream.
    pub at: Duration,
    pub geometry: Option<GeometrySnapshot>,
    /// Nose tip position, used by the static-frame check.
    pub anchor: Option<Point>,
}

impl Observation {
    pub fn new(at: Duration, geometry: GeometrySnapshot) -> Self {
        Self {
            at,
            geometry: Some(geometry),
            anchor: None,
        }
    }

    pub fn no_face(at: Duration) -> Self {
        Self {
            at,
            geometry: None,
            anchor: None,
        }
    }

    /// Measure a frame. `landmarks` is `None` when no face was detected.
    pub fn from_landmarks(
        at: Duration,
        landmarks: Option<&LandmarkSet>,
        lighting: f32,
        convention: YawConvention,
    ) -> Self {
        match landmarks {
            Some(lm) if !lm.is_empty() => Self {
                at,
                geometry: Some(GeometrySnapshot::measure(lm, lighting, convention)),
                anchor: lm.get(NOSE_TIP),
            },
            _ => Self::no_face(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::face_with_yaw;
    use approx::assert_relative_eq;

    #[test]
    fn test_frontal_face_has_zero_yaw() {
        let lm = face_with_yaw(0.0);
        assert_relative_eq!(compute_yaw(&lm, YawConvention::Mirrored), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_mirrored_inverts_raw_sign() {
        let lm = face_with_yaw(30.0);
        let mirrored = compute_yaw(&lm, YawConvention::Mirrored);
        let raw = compute_yaw(&lm, YawConvention::Raw);
        assert_relative_eq!(mirrored, 30.0, epsilon = 1e-3);
        assert_relative_eq!(raw, -30.0, epsilon = 1e-3);
    }

    #[test]
    fn test_yaw_clamps_past_profile() {
        // Nose outside the ear span saturates at 90 degrees
        let mut points = vec![Point::new(0.5, 0.5); 468];
        points[LEFT_EAR] = Point::new(0.4, 0.5);
        points[RIGHT_EAR] = Point::new(0.6, 0.5);
        points[NOSE_TIP] = Point::new(0.9, 0.5);
        let yaw = compute_yaw(&LandmarkSet::new(points), YawConvention::Raw);
        assert_relative_eq!(yaw, 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_missing_landmarks_yield_zero() {
        let lm = LandmarkSet::new(vec![Point::new(0.5, 0.5); 10]);
        assert_eq!(compute_yaw(&lm, YawConvention::Mirrored), 0.0);
        assert_eq!(compute_face_distance(&lm), 0.0);
        assert_eq!(compute_face_center_offset(&lm), CenterOffset::default());
    }

    #[test]
    fn test_degenerate_ear_span_yields_zero_yaw() {
        let mut points = vec![Point::new(0.5, 0.5); 468];
        points[NOSE_TIP] = Point::new(0.7, 0.5);
        assert_eq!(compute_yaw(&LandmarkSet::new(points), YawConvention::Raw), 0.0);
    }

    #[test]
    fn test_lighting_averages_channels() {
        // Two pixels: pure red and pure white
        let pixels = [255, 0, 0, 255, 255, 255, 255, 255];
        // R mean 255, G mean 127.5, B mean 127.5 → 170
        assert_relative_eq!(compute_lighting(&pixels, 2, 1), 170.0, epsilon = 1e-3);
    }

    #[test]
    fn test_lighting_ignores_alpha() {
        let pixels = [100, 100, 100, 0];
        assert_relative_eq!(compute_lighting(&pixels, 1, 1), 100.0);
    }

    #[test]
    fn test_lighting_short_buffer_is_zero() {
        assert_eq!(compute_lighting(&[10, 10, 10, 255], 2, 2), 0.0);
        assert_eq!(compute_lighting(&[], 0, 0), 0.0);
    }

    #[test]
    fn test_face_distance_and_offset() {
        let lm = face_with_yaw(0.0);
        // width 0.30, height 0.40
        assert_relative_eq!(compute_face_distance(&lm), 0.35, epsilon = 1e-5);
        let off = compute_face_center_offset(&lm);
        assert_relative_eq!(off.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(off.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_offset_is_absolute() {
        let mut points = vec![Point::new(0.5, 0.5); 468];
        points[LEFT_EAR] = Point::new(0.0, 0.5);
        points[RIGHT_EAR] = Point::new(0.2, 0.5);
        points[FOREHEAD] = Point::new(0.1, 0.6);
        points[CHIN] = Point::new(0.1, 1.0);
        let off = compute_face_center_offset(&LandmarkSet::new(points));
        assert_relative_eq!(off.x, 0.4, epsilon = 1e-5);
        assert_relative_eq!(off.y, 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_observation_without_landmarks_has_no_geometry() {
        let obs = Observation::from_landmarks(
            Duration::from_millis(5),
            None,
            120.0,
            YawConvention::Mirrored,
        );
        assert!(obs.geometry.is_none());
        assert!(obs.anchor.is_none());

        let empty = LandmarkSet::default();
        let obs = Observation::from_landmarks(
            Duration::ZERO,
            Some(&empty),
            120.0,
            YawConvention::Mirrored,
        );
        assert!(obs.geometry.is_none());
    }

    #[test]
    fn test_landmarks_deserialize_from_pairs() {
        let lm: LandmarkSet = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(lm.len(), 2);
        assert_eq!(lm.get(1), Some(Point::new(0.3, 0.4)));
    }
}
