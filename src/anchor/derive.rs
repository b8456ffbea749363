//! Geometric derivation of the raw anchor set.
//!
//! Everything here is a pure function of one frame's landmarks; all temporal state lives
//! in [`AnchorFilter`](super::AnchorFilter). Offsets and radii are proportional to the
//! measured face width, never absolute, so the geometry scales with how large the face
//! appears.

use nalgebra::{Point2, Vector2};

use crate::config::{StyleParams, Tuning};
use crate::coord::CoordMap;
use crate::landmark::{LandmarkIdx, Landmarks, FACE_OVAL, FOREHEAD_ARC, JAW_LINE};
use crate::num::{clamp01, lerp, normalize_or};

use super::{AnchorSet, Ellipse, MIN_RADIUS};

// Contour placement, as fractions of the face width.
const CHEEK_DROP_MIN: f32 = 0.10;
const CHEEK_DROP_MAX: f32 = 0.26;
const CHEEK_MOUTH_BLEND: f32 = 0.6;
const CHEEK_MOUTH_Y_MARGIN: f32 = 0.08;
const CHEEK_NOSE_X_BAND: f32 = 0.14;
const NOSE_LINE_OFFSET: f32 = 0.055;
const PLACEMENT_SHIFT: f32 = 0.05;
/// Jaw inset, as a fraction of each point's distance to the nose tip.
const JAW_INSET: f32 = 0.07;
/// Nose side-line extent along the bridge, as blend fractions of brow-mid to nose-tip.
const NOSE_LINE_START: f32 = 0.18;
const NOSE_LINE_END: f32 = 0.85;

// Exclusion sizing, relative to measured landmark distances.
const EYE_RX: f32 = 1.35;
const EYE_RY: f32 = 1.9;
const EYE_RY_MIN: f32 = 0.3;
const BROW_RX: f32 = 1.15;
const BROW_RY: f32 = 0.4;
const LIP_RX: f32 = 1.25;
const LIP_RY: f32 = 1.6;
const LIP_RY_MIN: f32 = 0.25;
const NOSTRIL_LATERAL: f32 = 0.75;
const NOSTRIL_ALONG: f32 = 0.18;
const NOSTRIL_RX: f32 = 0.55;
const NOSTRIL_RY: f32 = 0.42;

fn lm(landmarks: &Landmarks, idx: LandmarkIdx) -> Point2<f32> {
    landmarks.get(idx as usize).xy()
}

fn perp(v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(-v.y, v.x)
}

fn clamp_point(p: Point2<f32>) -> Point2<f32> {
    Point2::new(clamp01(p.x), clamp01(p.y))
}

fn blend(a: Point2<f32>, b: Point2<f32>, t: f32) -> Point2<f32> {
    Point2::from(a.coords.lerp(&b.coords, t))
}

/// The face-down direction in metric space: perpendicular to the blended temple and
/// outer-eye axes, oriented toward image-down.
///
/// Robust against rolled and mirrored faces; degenerate landmark clusters fall back to
/// image-down.
pub fn face_down(landmarks: &Landmarks, map: &CoordMap) -> Vector2<f32> {
    let temple_axis = normalize_or(
        map.metric_vec(lm(landmarks, LandmarkIdx::RightTemple) - lm(landmarks, LandmarkIdx::LeftTemple)),
        Vector2::x(),
    );
    let eye_axis = normalize_or(
        map.metric_vec(
            lm(landmarks, LandmarkIdx::RightEyeOuterCorner)
                - lm(landmarks, LandmarkIdx::LeftEyeOuterCorner),
        ),
        temple_axis,
    );
    let across = normalize_or(temple_axis + eye_axis, temple_axis);
    let down = perp(across);
    if down.y < 0.0 {
        -down
    } else {
        down
    }
}

/// Derives the raw anchor set for one frame.
///
/// `style` is assumed to be clamped already. Every returned point coordinate lies in
/// `[0, 1]` and every radius is positive, regardless of how degenerate the landmark input
/// is.
pub fn derive_raw(
    landmarks: &Landmarks,
    map: &CoordMap,
    style: &StyleParams,
    tuning: &Tuning,
) -> AnchorSet {
    let nose_tip = lm(landmarks, LandmarkIdx::NoseTip);
    let ear_l = lm(landmarks, LandmarkIdx::LeftEar);
    let ear_r = lm(landmarks, LandmarkIdx::RightEar);
    let face_width = map.metric_dist(ear_l, ear_r).max(super::MIN_FACE_WIDTH);
    let down = face_down(landmarks, map);

    // Cheek ribbons sit below the cheekbone by a face-proportional drop.
    let drop = map.from_metric_vec(
        down * (face_width * lerp(CHEEK_DROP_MIN, CHEEK_DROP_MAX, style.scale)),
    );
    let cheek_left = cheek_ribbon(
        landmarks,
        map,
        [LandmarkIdx::LeftEar, LandmarkIdx::LeftCheekbone, LandmarkIdx::LeftCheekMedial],
        LandmarkIdx::MouthLeft,
        nose_tip,
        drop,
        face_width,
    );
    let cheek_right = cheek_ribbon(
        landmarks,
        map,
        [LandmarkIdx::RightEar, LandmarkIdx::RightCheekbone, LandmarkIdx::RightCheekMedial],
        LandmarkIdx::MouthRight,
        nose_tip,
        drop,
        face_width,
    );

    let jaw = JAW_LINE.map(|i| blend(landmarks.get(i).xy(), nose_tip, JAW_INSET));

    // Nose side-lines flank the bridge centerline; no centerline is drawn.
    let brow_mid = blend(
        lm(landmarks, LandmarkIdx::LeftBrowInner),
        lm(landmarks, LandmarkIdx::RightBrowInner),
        0.5,
    );
    let bridge_dir = normalize_or(
        map.metric_vec(lm(landmarks, LandmarkIdx::MidBridge) - brow_mid),
        Vector2::y(),
    );
    let mut lateral = perp(bridge_dir);
    if lateral.x > 0.0 {
        lateral = -lateral;
    }
    let side_offset = map.from_metric_vec(lateral * (NOSE_LINE_OFFSET * face_width));
    let line_start = blend(brow_mid, nose_tip, NOSE_LINE_START);
    let line_end = blend(brow_mid, nose_tip, NOSE_LINE_END);
    let nose_left = [line_start + side_offset, line_end + side_offset];
    let nose_right = [line_start - side_offset, line_end - side_offset];

    let face_center = blend(
        lm(landmarks, LandmarkIdx::ForeheadTop),
        lm(landmarks, LandmarkIdx::Chin),
        0.45,
    );
    let forehead =
        FOREHEAD_ARC.map(|i| blend(landmarks.get(i).xy(), face_center, tuning.forehead_inset));

    let eye_left = eye_ellipse(
        map,
        lm(landmarks, LandmarkIdx::LeftEyeOuterCorner),
        lm(landmarks, LandmarkIdx::LeftEyeInnerCorner),
        lm(landmarks, LandmarkIdx::LeftEyeTop),
        lm(landmarks, LandmarkIdx::LeftEyeBottom),
    );
    let eye_right = eye_ellipse(
        map,
        lm(landmarks, LandmarkIdx::RightEyeOuterCorner),
        lm(landmarks, LandmarkIdx::RightEyeInnerCorner),
        lm(landmarks, LandmarkIdx::RightEyeTop),
        lm(landmarks, LandmarkIdx::RightEyeBottom),
    );
    let brow_left = brow_ellipse(
        map,
        lm(landmarks, LandmarkIdx::LeftBrowInner),
        lm(landmarks, LandmarkIdx::LeftBrowMid),
        lm(landmarks, LandmarkIdx::LeftBrowOuter),
    );
    let brow_right = brow_ellipse(
        map,
        lm(landmarks, LandmarkIdx::RightBrowInner),
        lm(landmarks, LandmarkIdx::RightBrowMid),
        lm(landmarks, LandmarkIdx::RightBrowOuter),
    );
    let lips = lip_ellipse(
        map,
        lm(landmarks, LandmarkIdx::MouthLeft),
        lm(landmarks, LandmarkIdx::MouthRight),
        lm(landmarks, LandmarkIdx::UpperLipTop),
        lm(landmarks, LandmarkIdx::LowerLipBottom),
    );

    let clip = FACE_OVAL.map(|i| clamp_point(landmarks.get(i).xy()));

    let mut set = AnchorSet {
        cheek_left,
        cheek_right,
        jaw,
        nose_left,
        nose_right,
        forehead,
        nose_tip: clamp_point(nose_tip),
        eye_left,
        eye_right,
        brow_left,
        brow_right,
        lips,
        // Overwritten below once the set exists.
        nostril_left: eye_left,
        nostril_right: eye_right,
        clip,
    };

    place_nostrils(&mut set, map);

    // Placement is a pure translation of the contour ribbons, applied after every clamp
    // and after nostril placement: exclusion shapes and the clip silhouette never move,
    // and user adjustment cannot re-enter the artifact zones relative to the contour.
    let shift = map.from_metric_vec(down * (style.placement * PLACEMENT_SHIFT * face_width));
    for p in set
        .cheek_left
        .iter_mut()
        .chain(set.cheek_right.iter_mut())
        .chain(set.jaw.iter_mut())
        .chain(set.nose_left.iter_mut())
        .chain(set.nose_right.iter_mut())
        .chain(set.forehead.iter_mut())
    {
        *p = clamp_point(*p + shift);
    }

    set
}

/// Re-derives the nostril exclusions from the (typically smoothed) nose geometry.
///
/// Nostrils are positioned off the nose tip using only placement-invariant measurements
/// of the side-lines (their span and direction), so contour placement shifts never move
/// them.
pub fn place_nostrils(set: &mut AnchorSet, map: &CoordMap) {
    let tip = map.metric(set.nose_tip);
    let l_start = map.metric(set.nose_left[0]);
    let l_end = map.metric(set.nose_left[1]);
    let r_end = map.metric(set.nose_right[1]);

    let span = r_end - l_end;
    let half_span = (span.norm() / 2.0).max(1e-3);
    let lat = normalize_or(span, Vector2::x());
    let along = normalize_or(l_end - l_start, Vector2::y());
    let radii = Vector2::new(
        (half_span * NOSTRIL_RX).max(MIN_RADIUS),
        (half_span * NOSTRIL_RY).max(MIN_RADIUS),
    );

    for (sign, out) in [
        (-1.0, &mut set.nostril_left),
        (1.0, &mut set.nostril_right),
    ] {
        let center =
            tip + lat * (sign * half_span * NOSTRIL_LATERAL) + along * (half_span * NOSTRIL_ALONG);
        *out = Ellipse {
            center: clamp_point(map.from_metric(center)),
            axis: lat,
            radii,
        };
    }
}

fn cheek_ribbon(
    landmarks: &Landmarks,
    map: &CoordMap,
    [ear, cheekbone, medial]: [LandmarkIdx; 3],
    mouth: LandmarkIdx,
    nose_tip: Point2<f32>,
    drop: Vector2<f32>,
    face_width: f32,
) -> [Point2<f32>; 3] {
    let mouth = lm(landmarks, mouth);
    let p0 = lm(landmarks, ear) + drop;
    let p1 = lm(landmarks, cheekbone) + drop;
    let mut p2 = lm(landmarks, medial) + drop;

    // Blend toward the mouth corner so the ribbon tapers instead of ending mid-cheek,
    // then keep it out of the nasolabial artifact zones.
    p2 = blend(p2, mouth, CHEEK_MOUTH_BLEND);

    let y_limit = mouth.y - CHEEK_MOUTH_Y_MARGIN * face_width;
    if p2.y > y_limit {
        p2.y = y_limit;
    }

    // Forbidden x-band around the nose tip: pull the endpoint back toward the cheekbone
    // until it clears the band.
    let min_dx = CHEEK_NOSE_X_BAND * face_width;
    let nose_x = map.metric(nose_tip).x;
    let side = if map.metric(p1).x < nose_x { -1.0 } else { 1.0 };
    let target_x = nose_x + side * min_dx;
    if (map.metric(p2).x - nose_x).abs() < min_dx {
        let p2x = map.metric(p2).x;
        let cbx = map.metric(p1).x;
        let t = if (cbx - p2x).abs() > 1e-6 {
            ((target_x - p2x) / (cbx - p2x)).clamp(0.0, 1.0)
        } else {
            1.0
        };
        p2 = blend(p2, p1, t);
        if (map.metric(p2).x - nose_x).abs() < min_dx {
            // Cheekbone itself is inside the band; clamp outright.
            let mut m = map.metric(p2);
            m.x = target_x;
            p2 = map.from_metric(m);
        }
        // The pullback can lift the endpoint back over the mouth margin.
        if p2.y > y_limit {
            p2.y = y_limit;
        }
    }

    [p0, p1, p2]
}

fn eye_ellipse(
    map: &CoordMap,
    outer: Point2<f32>,
    inner: Point2<f32>,
    top: Point2<f32>,
    bottom: Point2<f32>,
) -> Ellipse {
    let center = Point2::from((outer.coords + inner.coords + top.coords + bottom.coords) / 4.0);
    let axis = normalize_or(map.metric_vec(inner - outer), Vector2::x());
    let rx = (map.metric_dist(outer, inner) / 2.0 * EYE_RX).max(MIN_RADIUS);
    // Floor against blinks: a closed eye must keep its exclusion.
    let ry = (map.metric_dist(top, bottom) / 2.0 * EYE_RY).max(rx * EYE_RY_MIN);
    Ellipse {
        center: clamp_point(center),
        axis,
        radii: Vector2::new(rx, ry),
    }
}

fn brow_ellipse(
    map: &CoordMap,
    inner: Point2<f32>,
    mid: Point2<f32>,
    outer: Point2<f32>,
) -> Ellipse {
    let center = Point2::from((inner.coords + mid.coords + outer.coords) / 3.0);
    let axis = normalize_or(map.metric_vec(outer - inner), Vector2::x());
    let rx = (map.metric_dist(outer, inner) / 2.0 * BROW_RX).max(MIN_RADIUS);
    let ry = (rx * BROW_RY).max(MIN_RADIUS);
    Ellipse {
        center: clamp_point(center),
        axis,
        radii: Vector2::new(rx, ry),
    }
}

fn lip_ellipse(
    map: &CoordMap,
    left: Point2<f32>,
    right: Point2<f32>,
    top: Point2<f32>,
    bottom: Point2<f32>,
) -> Ellipse {
    let center = Point2::from((left.coords + right.coords + top.coords + bottom.coords) / 4.0);
    let axis = normalize_or(map.metric_vec(right - left), Vector2::x());
    let rx = (map.metric_dist(left, right) / 2.0 * LIP_RX).max(MIN_RADIUS);
    let ry = (map.metric_dist(top, bottom) / 2.0 * LIP_RY).max(rx * LIP_RY_MIN);
    Ellipse {
        center: clamp_point(center),
        axis,
        radii: Vector2::new(rx, ry),
    }
}
