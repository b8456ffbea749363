//! The one place where coordinate spaces are converted.
//!
//! Three spaces are involved per frame:
//!
//! - *normalized*: landmark coordinates, x and y in `[0, 1]` over the image, y down.
//! - *metric*: normalized with x scaled by the aspect ratio, making distances and angles
//!   isotropic. One metric unit equals the image height. All geometry (offsets, radii,
//!   perpendiculars) is computed here.
//! - *pixel*: normalized scaled by the output resolution.
//!
//! Mirroring of selfie-view input is undone here, exactly once per frame, so every
//! geometry stage works in non-mirrored normalized space. [`CoordMap::to_px`] re-applies
//! the flip on the way out, aligning canonical geometry with the mirrored frame again.

use nalgebra::{Point2, Vector2};

use crate::landmark::Landmarks;
use crate::resolution::Resolution;

/// Per-frame coordinate transform, threaded through every stage that touches geometry.
#[derive(Debug, Clone, Copy)]
pub struct CoordMap {
    resolution: Resolution,
    aspect: f32,
    mirrored: bool,
}

impl CoordMap {
    /// Creates the transform for one frame.
    ///
    /// # Panics
    ///
    /// Panics if `resolution` is empty. Callers gate on an established resolution before
    /// processing frames.
    pub fn new(resolution: Resolution, mirrored: bool) -> Self {
        assert!(!resolution.is_empty());
        Self {
            resolution,
            aspect: resolution.aspect_ratio(),
            mirrored,
        }
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    /// Flips mirrored landmark input back to non-mirrored normalized space.
    ///
    /// No-op unless the frame was flagged as mirrored.
    pub fn unmirror(&self, landmarks: &mut Landmarks) {
        if self.mirrored {
            landmarks.map_positions(|[x, y, z]| [1.0 - x, y, z]);
        }
    }

    /// Converts a normalized point to metric space.
    #[inline]
    pub fn metric(&self, p: Point2<f32>) -> Point2<f32> {
        Point2::new(p.x * self.aspect, p.y)
    }

    /// Converts a metric point back to normalized space.
    #[inline]
    pub fn from_metric(&self, p: Point2<f32>) -> Point2<f32> {
        Point2::new(p.x / self.aspect, p.y)
    }

    /// Converts a direction between normalized points to metric space.
    #[inline]
    pub fn metric_vec(&self, v: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(v.x * self.aspect, v.y)
    }

    /// Converts a metric direction back to a normalized-space offset.
    #[inline]
    pub fn from_metric_vec(&self, v: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(v.x / self.aspect, v.y)
    }

    /// Distance between two normalized points, measured in metric space.
    pub fn metric_dist(&self, a: Point2<f32>, b: Point2<f32>) -> f32 {
        (self.metric(a) - self.metric(b)).norm()
    }

    /// Converts a canonical normalized point to pixel coordinates of the output frame,
    /// flipping back into display space when the frame is mirrored.
    #[inline]
    pub fn to_px(&self, p: Point2<f32>) -> Point2<f32> {
        let x = if self.mirrored { 1.0 - p.x } else { p.x };
        Point2::new(
            x * self.resolution.width() as f32,
            p.y * self.resolution.height() as f32,
        )
    }

    /// Converts a metric length to pixels. One metric unit spans the image height.
    #[inline]
    pub fn metric_len_to_px(&self, len: f32) -> f32 {
        len * self.resolution.height() as f32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn unmirror_flips_x_once() {
        let mut lms = Landmarks::new(1);
        lms.set(0, [0.2, 0.7, 0.1]);

        let plain = CoordMap::new(Resolution::RES_720P, false);
        plain.unmirror(&mut lms);
        assert_eq!(lms.get(0).position(), [0.2, 0.7, 0.1]);

        let mirrored = CoordMap::new(Resolution::RES_720P, true);
        mirrored.unmirror(&mut lms);
        assert_eq!(lms.get(0).position(), [0.8, 0.7, 0.1]);
        mirrored.unmirror(&mut lms);
        assert_eq!(lms.get(0).position(), [0.2, 0.7, 0.1]);
    }

    #[test]
    fn metric_space_is_isotropic() {
        let map = CoordMap::new(Resolution::RES_720P, false);
        let horiz = map.metric_dist(Point2::new(0.4, 0.5), Point2::new(0.5, 0.5));
        let vert = map.metric_dist(Point2::new(0.5, 0.4), Point2::new(0.5, 0.5));
        assert_relative_eq!(horiz, 0.1 * 16.0 / 9.0, epsilon = 1e-6);
        assert_relative_eq!(vert, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn metric_round_trip() {
        let map = CoordMap::new(Resolution::RES_1080P, false);
        let p = Point2::new(0.3, 0.8);
        let back = map.from_metric(map.metric(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }

    #[test]
    fn pixel_mapping() {
        let map = CoordMap::new(Resolution::new(640, 480), false);
        let px = map.to_px(Point2::new(0.5, 0.25));
        assert_eq!((px.x, px.y), (320.0, 120.0));
        assert_eq!(map.metric_len_to_px(0.1), 48.0);
    }

    #[test]
    fn mirrored_map_flips_pixel_output() {
        let map = CoordMap::new(Resolution::new(640, 480), true);
        let px = map.to_px(Point2::new(0.25, 0.5));
        assert_eq!((px.x, px.y), (480.0, 240.0));
    }
}
