//! Framing checks: is the face close enough, far enough, and centered?
//!
//! The bands are wide on purpose. Natural movement during a challenge should
//! not flag the user as out of position.

use crate::config::Thresholds;
use crate::geometry::CenterOffset;

pub const MOVE_CLOSER: &str = "Please move closer to the camera";
pub const MOVE_AWAY: &str = "Please move a bit farther away";
pub const CENTER_FACE: &str = "Please center your face in the frame";
pub const POSITION_OK: &str = "Face position looks good";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Positioning {
    pub is_good: bool,
    pub message: &'static str,
}

/// Classify framing. The first failing check wins: too far, too close, off
/// center.
pub fn is_face_well_positioned(
    distance: f32,
    center_offset: CenterOffset,
    thresholds: &Thresholds,
) -> Positioning {
    let message = if distance < thresholds.min_face_distance {
        MOVE_CLOSER
    } else if distance > thresholds.max_face_distance {
        MOVE_AWAY
    } else if center_offset.x > thresholds.max_center_offset
        || center_offset.y > thresholds.max_center_offset
    {
        CENTER_FACE
    } else {
        return Positioning {
            is_good: true,
            message: POSITION_OK,
        };
    };

    Positioning {
        is_good: false,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered() -> CenterOffset {
        CenterOffset { x: 0.0, y: 0.0 }
    }

    #[test]
    fn test_good_position() {
        let p = is_face_well_positioned(0.35, centered(), &Thresholds::default());
        assert!(p.is_good);
        assert_eq!(p.message, POSITION_OK);
    }

    #[test]
    fn test_too_far_from_camera() {
        let p = is_face_well_positioned(0.10, centered(), &Thresholds::default());
        assert!(!p.is_good);
        assert_eq!(p.message, MOVE_CLOSER);
    }

    #[test]
    fn test_too_close_to_camera() {
        let p = is_face_well_positioned(0.80, centered(), &Thresholds::default());
        assert!(!p.is_good);
        assert_eq!(p.message, MOVE_AWAY);
    }

    #[test]
    fn test_off_center_on_either_axis() {
        let t = Thresholds::default();
        let x = is_face_well_positioned(0.35, CenterOffset { x: 0.3, y: 0.0 }, &t);
        let y = is_face_well_positioned(0.35, CenterOffset { x: 0.0, y: 0.3 }, &t);
        assert_eq!(x.message, CENTER_FACE);
        assert_eq!(y.message, CENTER_FACE);
    }

    #[test]
    fn test_distance_checked_before_centering() {
        // Both too far and off center: distance message wins
        let p = is_face_well_positioned(
            0.05,
            CenterOffset { x: 0.45, y: 0.45 },
            &Thresholds::default(),
        );
        assert_eq!(p.message, MOVE_CLOSER);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let t = Thresholds::default();
        let edge = CenterOffset {
            x: t.max_center_offset,
            y: t.max_center_offset,
        };
        assert!(is_face_well_positioned(t.min_face_distance, edge, &t).is_good);
        assert!(is_face_well_positioned(t.max_face_distance, edge, &t).is_good);
    }
}
