//! Semantic anchors derived from raw landmarks, and their temporal smoothing.
//!
//! An [`AnchorSet`] is the complete face-locked geometry the mask is rendered from:
//! contour ribbons, exclusion ellipses and the clip silhouette. It is re-derived from
//! scratch every frame (see [`derive`]) and then smoothed in place by an [`AnchorFilter`],
//! which owns one filter state per scalar channel.

pub mod derive;

use nalgebra::{Point2, Vector2};

use crate::coord::CoordMap;
use crate::filter::{OneEuroFilter, OneEuroFilterState, TimeBasedFilter};
use crate::landmark::{FACE_OVAL, FOREHEAD_ARC, JAW_LINE};
use crate::num::normalize_or;

/// Smallest permitted ellipse radius and face width, metric units.
const MIN_RADIUS: f32 = 1e-4;
const MIN_FACE_WIDTH: f32 = 0.02;

/// Indices into the clip ring corresponding to the ear landmarks.
const OVAL_RIGHT_EAR: usize = 8;
const OVAL_LEFT_EAR: usize = 28;

/// An axis-aligned-free ellipse used for exclusion cutouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Center in normalized coordinates.
    pub center: Point2<f32>,
    /// Major-axis direction, unit length in metric space.
    pub axis: Vector2<f32>,
    /// Radii along and across the axis, metric units.
    pub radii: Vector2<f32>,
}

impl Ellipse {
    /// Distance of a metric-space point from the center, normalized so 1.0 lies on the
    /// ellipse boundary.
    pub fn normalized_distance(&self, p: Point2<f32>, map: &CoordMap) -> f32 {
        let d = p - map.metric(self.center);
        let u = d.dot(&self.axis);
        let v = d.dot(&Vector2::new(-self.axis.y, self.axis.x));
        let rx = self.radii.x.max(MIN_RADIUS);
        let ry = self.radii.y.max(MIN_RADIUS);
        ((u / rx).powi(2) + (v / ry).powi(2)).sqrt()
    }

    fn renormalize(&mut self) {
        // Filtering nudges the axis off unit length only gradually; leave exact unit axes
        // untouched so an unfiltered shape round-trips bit-identically.
        if (self.axis.norm_squared() - 1.0).abs() > 1e-5 {
            self.axis = normalize_or(self.axis, Vector2::x());
        }
        self.radii = Vector2::new(
            self.radii.x.abs().max(MIN_RADIUS),
            self.radii.y.abs().max(MIN_RADIUS),
        );
    }
}

/// The full derived geometry for one frame.
///
/// Contour ribbons and the clip ring are polylines of normalized points; exclusion shapes
/// are [`Ellipse`]s. The nostril ellipses are re-derived from the smoothed nose geometry
/// after filtering and are not filter channels themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSet {
    /// Cheek ribbons: ear end, cheekbone, medial end.
    pub cheek_left: [Point2<f32>; 3],
    pub cheek_right: [Point2<f32>; 3],
    /// Jaw contour, left jaw corner over the chin to the right jaw corner.
    pub jaw: [Point2<f32>; JAW_LINE.len()],
    /// Nose shadow side-lines, top to bottom.
    pub nose_left: [Point2<f32>; 2],
    pub nose_right: [Point2<f32>; 2],
    /// Forehead ribbon along the hairline.
    pub forehead: [Point2<f32>; FOREHEAD_ARC.len()],
    /// Smoothed nose tip; reference point for nostril placement and strength weighting.
    pub nose_tip: Point2<f32>,
    pub eye_left: Ellipse,
    pub eye_right: Ellipse,
    pub brow_left: Ellipse,
    pub brow_right: Ellipse,
    pub lips: Ellipse,
    pub nostril_left: Ellipse,
    pub nostril_right: Ellipse,
    /// Face silhouette used as the clip shape.
    pub clip: [Point2<f32>; FACE_OVAL.len()],
}

impl AnchorSet {
    /// Number of filtered x/y channels.
    ///
    /// Contour points, the clip ring, the nose tip, and center/axis/radii of the five
    /// landmark-direct ellipses. Nostrils are excluded.
    pub const NUM_CHANNELS: usize =
        3 + 3 + JAW_LINE.len() + 2 + 2 + FOREHEAD_ARC.len() + 1 + 5 * 3 + FACE_OVAL.len();

    /// Visits every filtered channel, in a fixed order.
    ///
    /// The order is load-bearing: [`AnchorFilter`] assigns states by visitation index.
    fn for_each_channel(&mut self, mut f: impl FnMut(&mut f32, &mut f32)) {
        // `.x`/`.y` sit behind nalgebra's `Deref`, so both cannot be borrowed
        // mutably at once. Split the coordinate slice instead.
        fn xy(v: &mut Vector2<f32>) -> (&mut f32, &mut f32) {
            let [x, y] = v.as_mut_slice() else { unreachable!() };
            (x, y)
        }

        let points = self
            .cheek_left
            .iter_mut()
            .chain(self.cheek_right.iter_mut())
            .chain(self.jaw.iter_mut())
            .chain(self.nose_left.iter_mut())
            .chain(self.nose_right.iter_mut())
            .chain(self.forehead.iter_mut())
            .chain(std::iter::once(&mut self.nose_tip));
        for p in points {
            let (x, y) = xy(&mut p.coords);
            f(x, y);
        }
        for e in [
            &mut self.eye_left,
            &mut self.eye_right,
            &mut self.brow_left,
            &mut self.brow_right,
            &mut self.lips,
        ] {
            let (x, y) = xy(&mut e.center.coords);
            f(x, y);
            let (x, y) = xy(&mut e.axis);
            f(x, y);
            let (x, y) = xy(&mut e.radii);
            f(x, y);
        }
        for p in &mut self.clip {
            let (x, y) = xy(&mut p.coords);
            f(x, y);
        }
    }

    /// Restores shape invariants after per-channel filtering: unit axes, positive radii.
    fn renormalize_shapes(&mut self) {
        self.eye_left.renormalize();
        self.eye_right.renormalize();
        self.brow_left.renormalize();
        self.brow_right.renormalize();
        self.lips.renormalize();
        self.nostril_left.renormalize();
        self.nostril_right.renormalize();
    }

    /// Ear-to-ear face width in metric units, floored against degenerate input.
    pub fn face_width(&self, map: &CoordMap) -> f32 {
        map.metric_dist(self.clip[OVAL_LEFT_EAR], self.clip[OVAL_RIGHT_EAR])
            .max(MIN_FACE_WIDTH)
    }
}

/// Batch-filter for a whole [`AnchorSet`].
///
/// One [`OneEuroFilterState`] pair per channel, keyed by the fixed visitation order, so
/// every anchor keeps its own motion history while all channels share one parameter set.
pub struct AnchorFilter {
    params: OneEuroFilter,
    states: Vec<[OneEuroFilterState; 2]>,
}

impl AnchorFilter {
    /// Creates a filter bank covering every channel of an [`AnchorSet`].
    pub fn new(params: OneEuroFilter) -> Self {
        Self {
            params,
            states: std::iter::repeat_with(Default::default)
                .take(AnchorSet::NUM_CHANNELS)
                .collect(),
        }
    }

    /// Replaces the filter parameters without touching accumulated state.
    ///
    /// Adjusting the smoothing slider mid-stream must not make anchors jump.
    pub fn set_params(&mut self, params: OneEuroFilter) {
        self.params = params;
    }

    /// Filters the anchor set in place.
    pub fn apply(&mut self, anchors: &mut AnchorSet, elapsed: f32) {
        let params = self.params;
        let states = &mut self.states;
        let mut i = 0;
        anchors.for_each_channel(|x, y| {
            let [sx, sy] = &mut states[i];
            *x = params.filter(sx, *x, elapsed);
            *y = params.filter(sy, *y, elapsed);
            i += 1;
        });
        assert_eq!(i, states.len());
        anchors.renormalize_shapes();
    }

    /// Clears all channel states. The next [`AnchorFilter::apply`] re-seeds from raw
    /// values, used after a tracking-loss timeout.
    pub fn reset(&mut self) {
        for [sx, sy] in &mut self.states {
            sx.reset();
            sy.reset();
        }
    }
}
