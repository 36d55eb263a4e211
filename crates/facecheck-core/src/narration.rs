//! Live status line shown under the camera preview.
//!
//! Purely observational; nothing here feeds back into the state machine.

use crate::config::Thresholds;
use crate::geometry::GeometrySnapshot;
use crate::policy::is_face_well_positioned;
use crate::sequencer::ChallengeState;

pub fn commentary(
    state: ChallengeState,
    snapshot: Option<&GeometrySnapshot>,
    thresholds: &Thresholds,
) -> String {
    match state {
        ChallengeState::Idle => return "Ready when you are".to_string(),
        ChallengeState::Stopped => return "Verification stopped".to_string(),
        ChallengeState::Complete => return "Verification complete".to_string(),
        _ => {}
    }

    let Some(g) = snapshot else {
        return "No face detected".to_string();
    };

    if g.lighting < thresholds.min_lighting {
        return format!("Too dark ({:.0}), find more light", g.lighting);
    }

    let positioning = is_face_well_positioned(g.face_distance, g.center_offset, thresholds);
    if !positioning.is_good {
        return positioning.message.to_string();
    }

    match state {
        ChallengeState::Left => turn_progress("left", -g.yaw, -thresholds.left_yaw_threshold),
        ChallengeState::Right => turn_progress("right", g.yaw, thresholds.right_yaw_threshold),
        _ if g.yaw.abs() > thresholds.acceptable_yaw => {
            format!("Face the camera ({:.0}° off center)", g.yaw.abs())
        }
        _ => "Looking good, hold steady".to_string(),
    }
}

/// `turned` and `target` are both positive in the requested direction.
fn turn_progress(direction: &str, turned: f32, target: f32) -> String {
    if turned <= 0.0 {
        format!("Turn your head to the {direction}")
    } else if turned < target {
        format!("Keep turning {direction} ({turned:.0}° of {target:.0}°)")
    } else {
        format!("Turned {direction}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::good_geometry;

    #[test]
    fn test_terminal_states_ignore_geometry() {
        let t = Thresholds::default();
        assert_eq!(commentary(ChallengeState::Idle, None, &t), "Ready when you are");
        assert_eq!(
            commentary(ChallengeState::Complete, Some(&good_geometry(50.0)), &t),
            "Verification complete"
        );
    }

    #[test]
    fn test_no_face() {
        let t = Thresholds::default();
        assert_eq!(commentary(ChallengeState::Left, None, &t), "No face detected");
    }

    #[test]
    fn test_lighting_reported_before_position() {
        let t = Thresholds::default();
        let mut g = good_geometry(0.0);
        g.lighting = 12.0;
        g.face_distance = 0.01;
        assert!(commentary(ChallengeState::Center, Some(&g), &t).starts_with("Too dark"));
    }

    #[test]
    fn test_turn_progress_left() {
        let t = Thresholds::default();
        assert_eq!(
            commentary(ChallengeState::Left, Some(&good_geometry(5.0)), &t),
            "Turn your head to the left"
        );
        assert_eq!(
            commentary(ChallengeState::Left, Some(&good_geometry(-15.0)), &t),
            "Keep turning left (15° of 30°)"
        );
    }

    #[test]
    fn test_center_feedback() {
        let t = Thresholds::default();
        assert_eq!(
            commentary(ChallengeState::Center, Some(&good_geometry(3.0)), &t),
            "Looking good, hold steady"
        );
        assert!(commentary(ChallengeState::Center, Some(&good_geometry(-25.0)), &t)
            .starts_with("Face the camera"));
    }
}
