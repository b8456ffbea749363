//! Multi-channel soft mask rendering.
//!
//! The mask is a reduced-resolution float buffer with one channel per [`Region`]. The
//! rasterizer turns an [`AnchorSet`] into distance-field contributions per channel, clips
//! everything against the face silhouette, and punches out the exclusion ellipses. The
//! result is blurred and temporally stabilized before compositing.
//!
//! All geometry here is evaluated in metric space (x scaled by the aspect ratio, one unit
//! equals the image height), so field widths are isotropic and resolution independent.

use std::fmt;
use std::ops::Range;

use itertools::Itertools;
use nalgebra::Point2;

use crate::anchor::{AnchorSet, Ellipse};
use crate::config::Tuning;
use crate::coord::CoordMap;
use crate::num::{clamp01, lerp, smoothstep};
use crate::region::{PerRegion, Region, Side};
use crate::resolution::Resolution;

/// Solid band half-width per region, as fractions of face width.
const CHEEK_CORE_FRAC: f32 = 0.10;
const JAW_CORE_FRAC: f32 = 0.05;
const NOSE_CORE_FRAC: f32 = 0.03;
const FOREHEAD_CORE_FRAC: f32 = 0.06;

/// Nose side-lines feather tighter than the broad contours.
const NOSE_FEATHER_MUL: f32 = 0.6;

/// Softness of the exclusion cutout edge, relative to the ellipse radius.
const EXCLUSION_SOFT: f32 = 0.35;

/// Picks the mask resolution for a given output resolution.
///
/// The mask renders at a fraction of the output height, clamped to absolute bounds, with
/// the width following the output aspect ratio. The floor applies even to outputs
/// smaller than it.
pub fn mask_resolution(output: Resolution, tuning: &Tuning) -> Resolution {
    let height = (output.height() as f32 * tuning.mask_scale)
        .clamp(tuning.mask_min_px as f32, tuning.mask_max_px as f32)
        .round()
        .max(1.0) as u32;
    let width = (height as f32 * output.aspect_ratio()).round().max(1.0) as u32;
    Resolution::new(width, height)
}

/// A float mask with one channel per [`Region`].
#[derive(Clone)]
pub struct MaskBuffer {
    width: u32,
    height: u32,
    data: Vec<[f32; 4]>,
}

impl MaskBuffer {
    /// Creates a zeroed mask buffer.
    ///
    /// # Panics
    ///
    /// This method will panic if `resolution` contains no pixels.
    pub fn new(resolution: Resolution) -> Self {
        assert!(!resolution.is_empty());
        Self {
            width: resolution.width(),
            height: resolution.height(),
            data: vec![[0.0; 4]; resolution.num_pixels() as usize],
        }
    }

    /// Reallocates the buffer for a new resolution. Does nothing if the size is unchanged.
    pub fn resize(&mut self, resolution: Resolution) {
        if self.resolution() != resolution {
            *self = Self::new(resolution);
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Zeroes every texel without touching the allocation.
    pub fn clear(&mut self) {
        self.data.fill([0.0; 4]);
    }

    /// Returns the texel at the given coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this buffer.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.data[(y * self.width + x) as usize]
    }

    /// Samples the mask at normalized coordinates with bilinear filtering, clamping to
    /// the edge texels.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let fx = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let (x0, y0) = (fx as u32, fy as u32);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

        let (a, b) = (self.get(x0, y0), self.get(x1, y0));
        let (c, d) = (self.get(x0, y1), self.get(x1, y1));
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = lerp(lerp(a[i], b[i], tx), lerp(c[i], d[i], tx), ty);
        }
        out
    }

    #[inline]
    pub(crate) fn data(&self) -> &[[f32; 4]] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.data
    }
}

impl fmt::Debug for MaskBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} MaskBuffer", self.width, self.height)
    }
}

/// Renders anchor geometry into a [`MaskBuffer`].
///
/// Holds scratch buffers so per-frame rendering does not allocate.
pub struct MaskRasterizer {
    clip: Vec<f32>,
    pts: Vec<Point2<f32>>,
}

impl MaskRasterizer {
    pub fn new() -> Self {
        Self {
            clip: Vec::new(),
            pts: Vec::new(),
        }
    }

    /// Renders one frame of anchor geometry into `mask`.
    ///
    /// The clip silhouette gates every contribution before any blur; `sides` scales the
    /// left and right halves independently (indexed by [`Side::index`]).
    pub fn rasterize(
        &mut self,
        mask: &mut MaskBuffer,
        anchors: &AnchorSet,
        enables: PerRegion<bool>,
        sides: [f32; 2],
        tuning: &Tuning,
    ) {
        mask.clear();
        let map = CoordMap::new(mask.resolution(), false);
        let face_w = anchors.face_width(&map);
        let feather = tuning.feather_frac * face_w;

        self.render_clip(mask.resolution(), anchors, &map, tuning.clip_erosion);

        let (side_l, side_r) = (sides[Side::Left.index()], sides[Side::Right.index()]);
        let center_x = anchors
            .clip
            .iter()
            .map(|&p| map.metric(p).x)
            .sum::<f32>()
            / anchors.clip.len() as f32;
        // Contours spanning both halves blend the side weights by lateral position.
        let lateral = move |m: Point2<f32>| {
            let t = clamp01((m.x - center_x) / face_w + 0.5);
            lerp(side_l, side_r, t)
        };

        if enables[Region::Cheeks] {
            let core = CHEEK_CORE_FRAC * face_w;
            self.render_polyline(mask, Region::Cheeks, &anchors.cheek_left, &map, core, feather, |_| side_l);
            self.render_polyline(mask, Region::Cheeks, &anchors.cheek_right, &map, core, feather, |_| side_r);
        }
        if enables[Region::Jaw] {
            let core = JAW_CORE_FRAC * face_w;
            self.render_polyline(mask, Region::Jaw, &anchors.jaw, &map, core, feather, &lateral);
        }
        if enables[Region::Nose] {
            let core = NOSE_CORE_FRAC * face_w;
            let feather = feather * NOSE_FEATHER_MUL;
            self.render_polyline(mask, Region::Nose, &anchors.nose_left, &map, core, feather, |_| side_l);
            self.render_polyline(mask, Region::Nose, &anchors.nose_right, &map, core, feather, |_| side_r);
        }
        if enables[Region::Forehead] {
            let core = FOREHEAD_CORE_FRAC * face_w;
            self.render_polyline(mask, Region::Forehead, &anchors.forehead, &map, core, feather, &lateral);
        }

        for ellipse in [
            &anchors.eye_left,
            &anchors.eye_right,
            &anchors.brow_left,
            &anchors.brow_right,
            &anchors.lips,
            &anchors.nostril_left,
            &anchors.nostril_right,
        ] {
            cut_ellipse(mask, ellipse, &map);
        }
    }

    /// Rasterizes the eroded face silhouette into the clip scratch buffer.
    fn render_clip(&mut self, resolution: Resolution, anchors: &AnchorSet, map: &CoordMap, erosion: f32) {
        self.clip.clear();
        self.clip.resize(resolution.num_pixels() as usize, 0.0);

        self.pts.clear();
        self.pts.extend(anchors.clip.iter().map(|&p| map.metric(p)));
        let Some((xs, ys)) = texel_bounds(&self.pts, 0.0, map) else {
            return;
        };
        let width = resolution.width();
        for y in ys {
            for x in xs.clone() {
                let m = texel_metric(x, y, map);
                if point_in_polygon(m, &self.pts) {
                    let d = polygon_edge_distance(m, &self.pts);
                    self.clip[(y * width + x) as usize] = smoothstep(0.0, erosion.max(1e-5), d);
                }
            }
        }
    }

    /// Renders the soft distance field of one polyline into a mask channel, gated by the
    /// clip buffer and a per-texel weight.
    fn render_polyline(
        &mut self,
        mask: &mut MaskBuffer,
        region: Region,
        points: &[Point2<f32>],
        map: &CoordMap,
        core: f32,
        feather: f32,
        weight: impl Fn(Point2<f32>) -> f32,
    ) {
        self.pts.clear();
        self.pts.extend(points.iter().map(|&p| map.metric(p)));
        let Some((xs, ys)) = texel_bounds(&self.pts, core + feather, map) else {
            return;
        };
        let channel = region.channel();
        let width = mask.width();
        let texels = mask.data_mut();
        for y in ys {
            for x in xs.clone() {
                let m = texel_metric(x, y, map);
                let v = 1.0 - smoothstep(core, core + feather, polyline_distance(m, &self.pts));
                if v <= 0.0 {
                    continue;
                }
                let i = (y * width + x) as usize;
                let v = v * weight(m) * self.clip[i];
                let t = &mut texels[i][channel];
                *t = t.max(v);
            }
        }
    }
}

/// Multiplies all channels by the soft complement of an exclusion ellipse.
fn cut_ellipse(mask: &mut MaskBuffer, ellipse: &Ellipse, map: &CoordMap) {
    let center = map.metric(ellipse.center);
    let margin = ellipse.radii.x.max(ellipse.radii.y) * (1.0 + EXCLUSION_SOFT);
    let Some((xs, ys)) = texel_bounds(std::slice::from_ref(&center), margin, map) else {
        return;
    };
    let width = mask.width();
    let texels = mask.data_mut();
    for y in ys {
        for x in xs.clone() {
            let m = texel_metric(x, y, map);
            let keep = smoothstep(
                1.0 - EXCLUSION_SOFT,
                1.0 + EXCLUSION_SOFT,
                ellipse.normalized_distance(m, map),
            );
            if keep < 1.0 {
                for c in &mut texels[(y * width + x) as usize] {
                    *c *= keep;
                }
            }
        }
    }
}

/// Metric-space position of a texel center.
fn texel_metric(x: u32, y: u32, map: &CoordMap) -> Point2<f32> {
    let res = map.resolution();
    map.metric(Point2::new(
        (x as f32 + 0.5) / res.width() as f32,
        (y as f32 + 0.5) / res.height() as f32,
    ))
}

/// Texel ranges covering a set of metric points plus a metric margin, clamped to the
/// buffer. `None` if the area is empty or entirely off screen.
fn texel_bounds(
    pts: &[Point2<f32>],
    margin: f32,
    map: &CoordMap,
) -> Option<(Range<u32>, Range<u32>)> {
    let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in pts {
        min = Point2::new(min.x.min(p.x), min.y.min(p.y));
        max = Point2::new(max.x.max(p.x), max.y.max(p.y));
    }
    if !min.x.is_finite() {
        return None;
    }

    let res = map.resolution();
    let (w, h) = (res.width() as f32, res.height() as f32);
    let lo = map.from_metric(Point2::new(min.x - margin, min.y - margin));
    let hi = map.from_metric(Point2::new(max.x + margin, max.y + margin));
    let x0 = (lo.x * w).floor().clamp(0.0, w) as u32;
    let x1 = (hi.x * w).ceil().clamp(0.0, w) as u32;
    let y0 = (lo.y * h).floor().clamp(0.0, h) as u32;
    let y1 = (hi.y * h).ceil().clamp(0.0, h) as u32;
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0..x1, y0..y1))
}

fn segment_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 1e-12 {
        return (p - a).norm();
    }
    let t = clamp01((p - a).dot(&ab) / len2);
    (p - (a + ab * t)).norm()
}

fn polyline_distance(p: Point2<f32>, pts: &[Point2<f32>]) -> f32 {
    pts.iter()
        .tuple_windows()
        .map(|(&a, &b)| segment_distance(p, a, b))
        .fold(f32::INFINITY, f32::min)
}

/// Distance to the closed polygon outline.
fn polygon_edge_distance(p: Point2<f32>, poly: &[Point2<f32>]) -> f32 {
    let mut dist = f32::INFINITY;
    let mut prev = *poly.last().unwrap();
    for &next in poly {
        dist = dist.min(segment_distance(p, prev, next));
        prev = next;
    }
    dist
}

/// Even-odd test against a closed polygon.
fn point_in_polygon(p: Point2<f32>, poly: &[Point2<f32>]) -> bool {
    let mut inside = false;
    let mut prev = *poly.last().unwrap();
    for &next in poly {
        if (next.y > p.y) != (prev.y > p.y) {
            let x = next.x + (p.y - next.y) / (prev.y - next.y) * (prev.x - next.x);
            if p.x < x {
                inside = !inside;
            }
        }
        prev = next;
    }
    inside
}

#[cfg(test)]
mod tests {
    use crate::anchor::derive::derive_raw;
    use crate::config::StyleParams;
    use crate::synth::SyntheticFace;

    use super::*;

    fn test_anchors() -> AnchorSet {
        let map = CoordMap::new(Resolution::RES_720P, false);
        derive_raw(
            &SyntheticFace::new().landmarks(),
            &map,
            &StyleParams::default(),
            &Tuning::default(),
        )
    }

    fn rasterize(anchors: &AnchorSet, enables: PerRegion<bool>, sides: [f32; 2]) -> MaskBuffer {
        let tuning = Tuning::default();
        let mut mask = MaskBuffer::new(mask_resolution(Resolution::RES_720P, &tuning));
        MaskRasterizer::new().rasterize(&mut mask, anchors, enables, sides, &tuning);
        mask
    }

    fn value_at(mask: &MaskBuffer, p: Point2<f32>, region: Region) -> f32 {
        mask.sample(p.x, p.y)[region.channel()]
    }

    #[test]
    fn resolution_picker_clamps() {
        let tuning = Tuning::default();
        assert_eq!(
            mask_resolution(Resolution::RES_720P, &tuning),
            Resolution::new(640, 360)
        );
        // Small outputs floor at the minimum, even below the floor itself.
        assert_eq!(
            mask_resolution(Resolution::new(320, 180), &tuning).height(),
            96
        );
        assert_eq!(
            mask_resolution(Resolution::new(64, 36), &tuning).height(),
            96
        );
        assert_eq!(
            mask_resolution(Resolution::new(3840, 2160), &tuning).height(),
            480
        );
    }

    #[test]
    fn sample_matches_texel_centers() {
        let mut mask = MaskBuffer::new(Resolution::new(8, 4));
        mask.data_mut()[2 * 8 + 5] = [0.25, 0.5, 0.75, 1.0];
        let sampled = mask.sample(5.5 / 8.0, 2.5 / 4.0);
        assert_eq!(sampled, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(mask.get(5, 2), [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn resize_is_lazy() {
        let mut mask = MaskBuffer::new(Resolution::new(8, 4));
        mask.data_mut()[0] = [1.0; 4];
        mask.resize(Resolution::new(8, 4));
        assert_eq!(mask.get(0, 0), [1.0; 4]);
        mask.resize(Resolution::new(4, 4));
        assert_eq!(mask.get(0, 0), [0.0; 4]);
    }

    #[test]
    fn regions_render_into_their_channels() {
        let anchors = test_anchors();
        let mask = rasterize(&anchors, PerRegion::from_fn(|_| true), [1.0, 1.0]);

        assert!(value_at(&mask, anchors.cheek_left[1], Region::Cheeks) > 0.5);
        assert!(value_at(&mask, anchors.jaw[5], Region::Jaw) > 0.5);
        assert!(value_at(&mask, anchors.nose_left[1], Region::Nose) > 0.5);
        assert!(value_at(&mask, anchors.forehead[4], Region::Forehead) > 0.3);

        // Channels do not leak into each other.
        assert_eq!(value_at(&mask, anchors.cheek_left[1], Region::Jaw), 0.0);
    }

    #[test]
    fn disabled_region_stays_empty() {
        let anchors = test_anchors();
        let enables = PerRegion::from_fn(|r| r != Region::Cheeks);
        let mask = rasterize(&anchors, enables, [1.0, 1.0]);
        for texel in mask.data() {
            assert_eq!(texel[Region::Cheeks.channel()], 0.0);
        }
        assert!(value_at(&mask, anchors.jaw[5], Region::Jaw) > 0.5);
    }

    #[test]
    fn clip_gates_every_contribution() {
        let mut anchors = test_anchors();
        let reference = rasterize(&anchors, PerRegion::from_fn(|_| true), [1.0, 1.0]);
        assert!(value_at(&reference, anchors.cheek_left[1], Region::Cheeks) > 0.5);

        // Shrink the silhouette to a tiny ring around the nose; everything outside it
        // must vanish even though the contour geometry is unchanged.
        let center = anchors.nose_tip;
        for (i, p) in anchors.clip.iter_mut().enumerate() {
            let angle = i as f32 / 36.0 * std::f32::consts::TAU;
            *p = center + nalgebra::Vector2::new(angle.cos() * 0.01, angle.sin() * 0.02);
        }
        let clipped = rasterize(&anchors, PerRegion::from_fn(|_| true), [1.0, 1.0]);
        for region in Region::ALL {
            assert_eq!(value_at(&clipped, anchors.cheek_left[1], region), 0.0);
            assert_eq!(value_at(&clipped, anchors.forehead[4], region), 0.0);
        }
    }

    #[test]
    fn exclusion_cuts_whatever_it_covers() {
        let mut anchors = test_anchors();
        let target = anchors.cheek_left[1];
        let open = rasterize(&anchors, PerRegion::from_fn(|_| true), [1.0, 1.0]);
        assert!(value_at(&open, target, Region::Cheeks) > 0.5);

        anchors.eye_left = Ellipse {
            center: target,
            axis: nalgebra::Vector2::x(),
            radii: nalgebra::Vector2::new(0.08, 0.08),
        };
        let cut = rasterize(&anchors, PerRegion::from_fn(|_| true), [1.0, 1.0]);
        assert!(value_at(&cut, target, Region::Cheeks) < 1e-3);
    }

    #[test]
    fn side_weight_gates_one_half() {
        let anchors = test_anchors();
        let mask = rasterize(&anchors, PerRegion::from_fn(|_| true), [0.0, 1.0]);
        assert_eq!(value_at(&mask, anchors.cheek_left[1], Region::Cheeks), 0.0);
        assert!(value_at(&mask, anchors.cheek_right[1], Region::Cheeks) > 0.5);
    }
}
