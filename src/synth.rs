//! Synthetic face-mesh packets for tests and the demo binary.
//!
//! Stands in for the real landmark tracker: a parametric head model whose 478 points are
//! placed in head-local space, rotated by yaw/pitch/roll, and projected to normalized
//! image coordinates. Only the points the sculpting geometry reads are anatomically
//! placed; the rest are a deterministic filler cloud inside the face oval.
//!
//! The emitted geometry assumes a 16:9 frame, so that the face is round in metric space
//! when processed at [`Resolution::RES_720P`] or [`Resolution::RES_1080P`].
//!
//! [`Resolution::RES_720P`]: crate::resolution::Resolution::RES_720P
//! [`Resolution::RES_1080P`]: crate::resolution::Resolution::RES_1080P

use std::f32::consts::TAU;

use nalgebra::{Rotation3, Vector3};

use crate::landmark::{FramePacket, LandmarkIdx, Landmarks, FACE_OVAL, NUM_LANDMARKS};

const ASPECT: f32 = 16.0 / 9.0;

/// Head half-extents in metric units at scale 1.0.
const HALF_W: f32 = 0.16;
const HALF_H: f32 = 0.21;
const DEPTH: f32 = 0.10;

/// A parametric face that can be posed, scaled and jittered.
#[derive(Debug, Clone)]
pub struct SyntheticFace {
    center: (f32, f32),
    scale: f32,
    yaw: f32,
    pitch: f32,
    roll: f32,
    jitter: f32,
    seed: u64,
}

impl Default for SyntheticFace {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticFace {
    /// A frontal face centered in the frame, spanning roughly a third of its height.
    pub fn new() -> Self {
        Self {
            center: (0.5, 0.5),
            scale: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            jitter: 0.0,
            seed: 0x7ace,
        }
    }

    /// Face center in normalized coordinates.
    pub fn with_center(mut self, x: f32, y: f32) -> Self {
        self.center = (x, y);
        self
    }

    /// Scales the whole head. 1.0 is the default size.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Turns the head about the vertical axis. Positive brings the right side of the
    /// image closer to the camera.
    pub fn with_yaw(mut self, degrees: f32) -> Self {
        self.yaw = degrees.to_radians();
        self
    }

    /// Nods the head. Positive tilts the chin toward the camera (camera looking up).
    pub fn with_pitch(mut self, degrees: f32) -> Self {
        self.pitch = degrees.to_radians();
        self
    }

    /// Tilts the head in the image plane.
    pub fn with_roll(mut self, degrees: f32) -> Self {
        self.roll = degrees.to_radians();
        self
    }

    /// Adds per-frame positional noise of the given amplitude (normalized units) to
    /// every landmark. [`SyntheticFace::landmarks_at`] stays deterministic per frame.
    pub fn with_jitter(mut self, amplitude: f32) -> Self {
        self.jitter = amplitude;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The landmark set for frame 0.
    pub fn landmarks(&self) -> Landmarks {
        self.landmarks_at(0)
    }

    /// The landmark set for a given frame index.
    ///
    /// Without jitter all frames are identical; with jitter each frame gets its own
    /// deterministic noise.
    pub fn landmarks_at(&self, frame: u32) -> Landmarks {
        let mut lms = Landmarks::new(NUM_LANDMARKS);

        // Filler cloud for every index the geometry never reads directly.
        let mut filler = fastrand::Rng::with_seed(self.seed);
        for i in 0..NUM_LANDMARKS {
            let a = filler.f32() * TAU;
            let r = filler.f32().sqrt() * 0.7;
            lms.set(i, self.project([r * a.sin(), r * a.cos(), 0.3]));
        }

        // Face oval ring, clockwise from the forehead top.
        for (i, &li) in FACE_OVAL.iter().enumerate() {
            let theta = i as f32 / FACE_OVAL.len() as f32 * TAU;
            lms.set(li, self.project([theta.sin(), -theta.cos(), 0.0]));
        }

        use LandmarkIdx as I;
        let named: &[(LandmarkIdx, [f32; 3])] = &[
            (I::NoseTip, [0.0, 0.02, 0.75]),
            (I::NoseBottom, [0.0, 0.12, 0.62]),
            (I::MidBridge, [0.0, -0.18, 0.55]),
            (I::LeftNoseWing, [-0.14, 0.06, 0.55]),
            (I::RightNoseWing, [0.14, 0.06, 0.55]),
            (I::LeftEyeOuterCorner, [-0.52, -0.25, 0.35]),
            (I::LeftEyeInnerCorner, [-0.18, -0.24, 0.35]),
            (I::LeftEyeTop, [-0.35, -0.31, 0.35]),
            (I::LeftEyeBottom, [-0.35, -0.19, 0.35]),
            (I::RightEyeOuterCorner, [0.52, -0.25, 0.35]),
            (I::RightEyeInnerCorner, [0.18, -0.24, 0.35]),
            (I::RightEyeTop, [0.35, -0.31, 0.35]),
            (I::RightEyeBottom, [0.35, -0.19, 0.35]),
            (I::LeftBrowInner, [-0.14, -0.42, 0.38]),
            (I::LeftBrowMid, [-0.34, -0.46, 0.38]),
            (I::LeftBrowOuter, [-0.52, -0.42, 0.38]),
            (I::RightBrowInner, [0.14, -0.42, 0.38]),
            (I::RightBrowMid, [0.34, -0.46, 0.38]),
            (I::RightBrowOuter, [0.52, -0.42, 0.38]),
            (I::MouthLeft, [-0.30, 0.42, 0.42]),
            (I::MouthRight, [0.30, 0.42, 0.42]),
            (I::UpperLipTop, [0.0, 0.34, 0.50]),
            (I::LowerLipBottom, [0.0, 0.52, 0.48]),
            (I::LeftCheekbone, [-0.62, 0.02, 0.30]),
            (I::RightCheekbone, [0.62, 0.02, 0.30]),
            (I::LeftCheekMedial, [-0.34, 0.18, 0.45]),
            (I::RightCheekMedial, [0.34, 0.18, 0.45]),
        ];
        for &(idx, local) in named {
            lms.set(idx as usize, self.project(local));
        }

        if self.jitter > 0.0 {
            let mut noise = fastrand::Rng::with_seed(self.seed ^ (u64::from(frame) + 1) * 0x9e37);
            lms.map_positions(|[x, y, z]| {
                [
                    x + (noise.f32() - 0.5) * 2.0 * self.jitter,
                    y + (noise.f32() - 0.5) * 2.0 * self.jitter,
                    z,
                ]
            });
        }

        lms
    }

    /// A tracking-valid, non-mirrored packet for frame 0.
    pub fn packet(&self, timestamp: f64) -> FramePacket {
        FramePacket::new(self.landmarks(), timestamp)
    }

    /// A tracking-valid packet for a frame index at the given frame rate.
    pub fn packet_at(&self, frame: u32, fps: f64) -> FramePacket {
        FramePacket::new(self.landmarks_at(frame), f64::from(frame) / fps)
    }

    fn project(&self, [u, v, w]: [f32; 3]) -> [f32; 3] {
        let local = Vector3::new(u * HALF_W, v * HALF_H, w * DEPTH) * self.scale;
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), -self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch);
        let p = rot * local;
        [
            self.center.0 + p.x / ASPECT,
            self.center.1 + p.y,
            // Depth decreases toward the camera.
            -p.z,
        ]
    }
}
