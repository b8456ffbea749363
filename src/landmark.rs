//! Facial landmark input from the tracking collaborator.
//!
//! The tracker is not part of this crate. It hands over one [`FramePacket`] per video
//! frame, carrying the 478 landmarks of MediaPipe's [Face Mesh] topology (468 mesh points
//! plus 10 iris points) in normalized image coordinates.
//!
//! This module owns all knowledge of the mesh topology: named indices for the points the
//! sculpting geometry is built from, and the ordered index rings for the jaw line, the
//! forehead arc and the face silhouette.
//!
//! [Face Mesh]: https://google.github.io/mediapipe/solutions/face_mesh.html

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Number of landmarks in each [`FramePacket`].
pub const NUM_LANDMARKS: usize = 478;

type Position = [f32; 3];

/// A fixed-length collection of 3D landmark positions.
///
/// Coordinates are normalized: x and y lie in `[0, 1]` over the camera image (y pointing
/// down), z is a relative depth proxy that decreases towards the camera, in units
/// comparable to x.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks will start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark {
            pos: self.positions[index],
        }
    }

    pub fn set(&mut self, index: usize, pos: Position) {
        self.positions[index] = pos;
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }

    /// Clamps every landmark into the valid coordinate range.
    ///
    /// Non-finite coordinates are replaced with the image center (depth 0.0), x and y are
    /// clamped to `[0, 1]` and z to `[-1, 1]`. Downstream geometry never has to re-check
    /// for NaN after this.
    pub fn sanitize(&mut self) {
        self.map_positions(|[x, y, z]| {
            if x.is_finite() && y.is_finite() && z.is_finite() {
                [x.clamp(0.0, 1.0), y.clamp(0.0, 1.0), z.clamp(-1.0, 1.0)]
            } else {
                [0.5, 0.5, 0.0]
            }
        });
    }
}

/// A single landmark position.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
}

impl Landmark {
    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Returns the x/y position, ignoring depth.
    #[inline]
    pub fn xy(&self) -> Point2<f32> {
        Point2::new(self.pos[0], self.pos[1])
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }
}

/// Per-frame input handed over by the landmark tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePacket {
    pub landmarks: Landmarks,
    /// Monotonic capture timestamp in seconds.
    pub timestamp: f64,
    /// `false` while the tracker has lost the face. Landmark data is stale in that case
    /// and must not be used for geometry.
    pub tracking: bool,
    /// Whether the landmarks (and the video frame they belong to) are horizontally
    /// mirrored, as in a selfie preview.
    pub mirrored: bool,
}

impl FramePacket {
    /// Creates a packet for a tracked face.
    pub fn new(landmarks: Landmarks, timestamp: f64) -> Self {
        Self {
            landmarks,
            timestamp,
            tracking: true,
            mirrored: false,
        }
    }
}

/// Indices of individual landmarks the sculpting geometry is derived from.
///
/// "Left" and "Right" are relative to the input image, not from the PoV of the depicted
/// person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    ForeheadTop = 10,
    NoseTip = 1,
    NoseBottom = 2,
    MidBridge = 195,
    Chin = 152,
    LeftTemple = 127,
    RightTemple = 356,
    LeftEar = 234,
    RightEar = 454,
    LeftCheekbone = 116,
    RightCheekbone = 345,
    LeftCheekMedial = 50,
    RightCheekMedial = 280,
    LeftNoseWing = 98,
    RightNoseWing = 327,
    MouthLeft = 61,
    MouthRight = 291,
    UpperLipTop = 0,
    LowerLipBottom = 17,
    LeftEyeOuterCorner = 33,
    LeftEyeInnerCorner = 133,
    LeftEyeTop = 159,
    LeftEyeBottom = 145,
    RightEyeInnerCorner = 362,
    RightEyeOuterCorner = 263,
    RightEyeTop = 386,
    RightEyeBottom = 374,
    LeftBrowInner = 107,
    LeftBrowMid = 105,
    LeftBrowOuter = 70,
    RightBrowInner = 336,
    RightBrowMid = 334,
    RightBrowOuter = 300,
}

/// Jaw line from the left jaw corner over the chin to the right jaw corner, ordered.
pub const JAW_LINE: [usize; 11] = [58, 172, 136, 150, 176, 152, 400, 379, 365, 397, 288];

/// Forehead arc along the hairline, left temple to right temple, ordered.
pub const FOREHEAD_ARC: [usize; 9] = [54, 103, 67, 109, 10, 338, 297, 332, 284];

/// Face silhouette ring, clockwise starting at the forehead top.
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];
