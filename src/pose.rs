//! Head pose proxies from raw landmarks.
//!
//! These are not a rigid-body solve. They are cheap monocular proxies good enough to
//! modulate shading strength: roll from the eye line, yaw from ear depth asymmetry,
//! pitch from the forehead-chin depth tilt. Each angle is eased into a `[0, 1]` reaction
//! factor with configurable onset/saturation thresholds.

use nalgebra::{Rotation2, Vector2};

use crate::config::Tuning;
use crate::coord::CoordMap;
use crate::landmark::{LandmarkIdx, Landmarks};
use crate::num::smoothstep;

/// Pose angles and their eased reaction factors for one frame.
#[derive(Debug, Clone, Copy)]
pub struct PoseEstimate {
    /// In-plane head tilt, radians. Positive rotates the right eye downward.
    pub roll: f32,
    /// Turn proxy, radians. Positive when the right side of the image is closer to the
    /// camera.
    pub yaw: f32,
    /// Nod proxy, radians, recentered by the resting pitch. Positive when the chin tilts
    /// toward the camera (camera below the face).
    pub pitch: f32,
    /// How strongly to react to a camera-below-face pose, in `[0, 1]`.
    pub low_angle: f32,
    /// How strongly to react to a camera-above-face pose, in `[0, 1]`.
    pub high_angle: f32,
    /// Turn magnitude factor, in `[0, 1]`.
    pub turn: f32,
}

/// Estimates the head pose for one frame. Pure function, no state.
pub fn estimate(landmarks: &Landmarks, map: &CoordMap, tuning: &Tuning) -> PoseEstimate {
    let get = |idx: LandmarkIdx| landmarks.get(idx as usize);

    let eye_l = get(LandmarkIdx::LeftEyeOuterCorner);
    let eye_r = get(LandmarkIdx::RightEyeOuterCorner);
    let eye_vec = map.metric_vec(eye_r.xy() - eye_l.xy());
    let roll = Rotation2::rotation_between(&Vector2::x(), &eye_vec).angle();

    // Ear depth asymmetry, normalized by eye separation so the proxy is invariant to
    // face size.
    let eye_sep = eye_vec.norm().max(0.02);
    let dz = get(LandmarkIdx::LeftEar).z() - get(LandmarkIdx::RightEar).z();
    let yaw = (dz / eye_sep).atan();

    let forehead = get(LandmarkIdx::ForeheadTop);
    let chin = get(LandmarkIdx::Chin);
    let vy = (chin.y() - forehead.y()).abs().max(1e-6);
    let vz = chin.z() - forehead.z();
    let pitch = (-vz).atan2(vy) - tuning.pitch_rest_deg.to_radians();

    let pitch_deg = pitch.to_degrees();
    let onset = tuning.pitch_onset_deg;
    let saturation = tuning.pitch_saturation_deg;
    PoseEstimate {
        roll,
        yaw,
        pitch,
        low_angle: smoothstep(onset, saturation, pitch_deg),
        high_angle: smoothstep(onset, saturation, -pitch_deg),
        turn: smoothstep(0.0, tuning.yaw_saturation_deg, yaw.to_degrees().abs()),
    }
}
