//! End-to-end scenarios running the full pipeline against synthetic landmark streams.

use kage::anchor::derive;
use kage::config::{StyleParams, Tuning};
use kage::coord::CoordMap;
use kage::image::{Color, Image};
use kage::landmark::FramePacket;
use kage::pipeline::Pipeline;
use kage::resolution::Resolution;
use kage::synth::SyntheticFace;
use nalgebra::Point2;

const RES: Resolution = Resolution::new(320, 240);
const SKIN: Color = Color::from_rgb8(184, 152, 128);
const FPS: f64 = 30.0;

fn base_frame() -> Image {
    Image::filled(RES.width(), RES.height(), SKIN)
}

fn run_frame(pipeline: &mut Pipeline, packet: &FramePacket) -> Image {
    let mut frame = base_frame();
    assert!(pipeline.process(packet, &mut frame));
    frame
}

fn max_channel_diff(a: &Image, b: &Image) -> u8 {
    assert_eq!(a.resolution(), b.resolution());
    let mut max = 0u8;
    for y in 0..a.height() {
        for x in 0..a.width() {
            let (pa, pb) = (a.get(x, y), b.get(x, y));
            for d in [
                pa.r().abs_diff(pb.r()),
                pa.g().abs_diff(pb.g()),
                pa.b().abs_diff(pb.b()),
                pa.a().abs_diff(pb.a()),
            ] {
                max = max.max(d);
            }
        }
    }
    max
}

/// A motionless face: anchors lock on immediately and the output only changes through
/// the confidence fade-in, which has all but converged after two seconds.
#[test]
fn static_face_settles() {
    let face = SyntheticFace::new();
    let mut pipeline = Pipeline::new(StyleParams::default());
    pipeline.set_resolution(RES);

    run_frame(&mut pipeline, &face.packet_at(0, FPS));
    run_frame(&mut pipeline, &face.packet_at(1, FPS));
    let locked = pipeline.anchors().unwrap().clone();

    for i in 2..58 {
        run_frame(&mut pipeline, &face.packet_at(i, FPS));
    }
    let settling = run_frame(&mut pipeline, &face.packet_at(58, FPS));
    let settled = run_frame(&mut pipeline, &face.packet_at(59, FPS));
    assert!(max_channel_diff(&settling, &settled) <= 1);

    // The anchors locked on within two frames and have not wandered since.
    let anchors = pipeline.anchors().unwrap();
    assert!((anchors.nose_tip - locked.nose_tip).norm() < 1e-5);
    assert!((anchors.cheek_left[1] - locked.cheek_left[1]).norm() < 1e-5);
    assert!((anchors.jaw[5] - locked.jaw[5]).norm() < 1e-5);
    assert!(pipeline.confidence() > 0.9);
}

/// Landmark jitter must come out attenuated: the filtered nose tip moves a lot less
/// frame-to-frame than the raw derived one.
#[test]
fn jitter_is_damped() {
    let face = SyntheticFace::new().with_jitter(0.002).with_seed(7);
    let mut pipeline = Pipeline::new(StyleParams::default());
    pipeline.set_resolution(RES);

    let map = CoordMap::new(RES, false);
    let style = StyleParams::default();
    let tuning = Tuning::default();

    let mut raw_travel = 0.0;
    let mut filtered_travel = 0.0;
    let mut prev_raw: Option<Point2<f32>> = None;
    let mut prev_filtered: Option<Point2<f32>> = None;
    for i in 0..50 {
        let packet = face.packet_at(i, FPS);
        let raw = derive::derive_raw(&packet.landmarks, &map, &style, &tuning).nose_tip;
        run_frame(&mut pipeline, &packet);
        let filtered = pipeline.anchors().unwrap().nose_tip;

        if let (Some(pr), Some(pf)) = (prev_raw, prev_filtered) {
            raw_travel += (raw - pr).norm();
            filtered_travel += (filtered - pf).norm();
        }
        prev_raw = Some(raw);
        prev_filtered = Some(filtered);
    }

    assert!(raw_travel > 0.0);
    assert!(
        filtered_travel < raw_travel * 0.8,
        "filtered {filtered_travel} vs raw {raw_travel}"
    );
}

/// Short tracking dropouts fade the overlay down and back up without jumps, keeping the
/// last anchor geometry frozen in the meantime.
#[test]
fn tracking_loss_fades_and_recovers() {
    let face = SyntheticFace::new();
    let mut pipeline = Pipeline::new(StyleParams::default());
    pipeline.set_resolution(RES);

    for i in 0..30 {
        run_frame(&mut pipeline, &face.packet_at(i, FPS));
    }
    let frozen = pipeline.anchors().unwrap().clone();
    let mut confidence = pipeline.confidence();
    assert!(confidence > 0.5);

    for i in 30..35 {
        let mut packet = face.packet_at(i, FPS);
        packet.tracking = false;
        run_frame(&mut pipeline, &packet);

        let next = pipeline.confidence();
        assert!(next < confidence);
        assert!(confidence - next < 0.3, "fade-out jumped");
        confidence = next;
    }
    assert_eq!(pipeline.anchors().unwrap(), &frozen);

    // 5 dropped frames is well inside the reset timeout, so recovery is seamless.
    for i in 35..45 {
        run_frame(&mut pipeline, &face.packet_at(i, FPS));
        let next = pipeline.confidence();
        assert!(next > confidence);
        assert!(next - confidence < 0.3, "fade-in jumped");
        confidence = next;
    }
}

/// A gap longer than the timeout re-seeds all filter state: the next anchors are exactly
/// the freshly derived ones, with no pull from before the gap.
#[test]
fn long_gap_resets_filter_state() {
    let face = SyntheticFace::new();
    let mut pipeline = Pipeline::new(StyleParams::default());
    pipeline.set_resolution(RES);

    run_frame(&mut pipeline, &face.packet(0.0));

    let moved = SyntheticFace::new().with_center(0.56, 0.48).with_yaw(8.0);
    let packet = moved.packet(1.0);
    run_frame(&mut pipeline, &packet);

    let map = CoordMap::new(RES, false);
    let expected = derive::derive_raw(
        &packet.landmarks,
        &map,
        &StyleParams::default(),
        &Tuning::default(),
    );
    assert_eq!(pipeline.anchors().unwrap(), &expected);
}

/// Placement slides the contour ribbons along the face-down axis, farther the larger
/// the control, and touches nothing else: exclusion shapes and the clip silhouette
/// stay put.
#[test]
fn placement_shifts_contours_only() {
    let face = SyntheticFace::new();
    let packet = face.packet(0.0);
    let map = CoordMap::new(RES, false);
    let down = derive::face_down(&packet.landmarks, &map);

    let anchors_at = |placement: f32| {
        let mut style = StyleParams::default();
        style.placement = placement;
        let mut pipeline = Pipeline::new(style);
        pipeline.set_resolution(RES);
        run_frame(&mut pipeline, &face.packet(0.0));
        pipeline.anchors().unwrap().clone()
    };
    let a = anchors_at(0.0);
    let h = anchors_at(0.5);
    let b = anchors_at(1.0);

    let contours = a
        .cheek_left
        .iter()
        .zip(&h.cheek_left)
        .zip(&b.cheek_left)
        .chain(a.cheek_right.iter().zip(&h.cheek_right).zip(&b.cheek_right))
        .chain(a.jaw.iter().zip(&h.jaw).zip(&b.jaw))
        .chain(a.nose_left.iter().zip(&h.nose_left).zip(&b.nose_left))
        .chain(a.nose_right.iter().zip(&h.nose_right).zip(&b.nose_right))
        .chain(a.forehead.iter().zip(&h.forehead).zip(&b.forehead));
    for ((pa, ph), pb) in contours {
        let half = map.metric_vec(ph - pa).dot(&down);
        let full = map.metric_vec(pb - pa).dot(&down);
        assert!(half > 0.0, "contour point did not move down");
        assert!(full > half, "shift is not monotonic in placement");
    }

    assert_eq!(a.nose_tip, b.nose_tip);
    assert_eq!(a.eye_left, b.eye_left);
    assert_eq!(a.eye_right, b.eye_right);
    assert_eq!(a.brow_left, b.brow_left);
    assert_eq!(a.brow_right, b.brow_right);
    assert_eq!(a.lips, b.lips);
    assert_eq!(a.clip, b.clip);
    // Nostrils are re-derived from shift-invariant measurements; identical up to
    // floating-point noise.
    assert!((a.nostril_left.center - b.nostril_left.center).norm() < 1e-4);
    assert!((a.nostril_right.center - b.nostril_right.center).norm() < 1e-4);
}

/// Mask-only mode produces a usable mask without ever seeing a video frame.
#[test]
fn mask_only_mode_needs_no_frames() {
    let face = SyntheticFace::new();
    let mut pipeline = Pipeline::new(StyleParams::default());
    pipeline.set_resolution(RES);

    pipeline.process_mask(&face.packet_at(0, FPS)).unwrap();
    let mask = pipeline.process_mask(&face.packet_at(1, FPS)).unwrap();

    let mut total = 0.0;
    for v in 0..16 {
        for u in 0..16 {
            let texel = mask.sample((u as f32 + 0.5) / 16.0, (v as f32 + 0.5) / 16.0);
            for value in texel {
                assert!(value.is_finite() && value >= 0.0);
                total += value;
            }
        }
    }
    assert!(total > 0.0, "mask has no coverage");
}

/// Regions whose effective strength is zero leave their mask channel empty.
#[test]
fn disabled_regions_keep_their_channel_empty() {
    let mut style = StyleParams::default();
    style.cheek = 0.0;
    style.jaw = 0.0;
    style.forehead = 0.0;
    style.nose = 0.9;

    let face = SyntheticFace::new();
    let mut pipeline = Pipeline::new(style);
    pipeline.set_resolution(RES);
    let mask = pipeline.process_mask(&face.packet(0.0)).unwrap();

    let mut nose_max = 0.0f32;
    for v in 0..32 {
        for u in 0..32 {
            let texel = mask.sample((u as f32 + 0.5) / 32.0, (v as f32 + 0.5) / 32.0);
            assert_eq!(texel[0], 0.0);
            assert_eq!(texel[1], 0.0);
            assert_eq!(texel[3], 0.0);
            nose_max = nose_max.max(texel[2]);
        }
    }
    assert!(nose_max > 0.0, "nose channel should have coverage");
}

/// A mirrored packet of the mirrored landmarks composites to the horizontal flip of the
/// unmirrored result (up to rounding).
#[test]
fn mirrored_output_is_a_flipped_composite() {
    let face = SyntheticFace::new().with_center(0.58, 0.5);

    let mut plain = Pipeline::new(StyleParams::default());
    plain.set_resolution(RES);
    let out_plain = run_frame(&mut plain, &face.packet(0.0));

    let mut packet = face.packet(0.0);
    packet
        .landmarks
        .map_positions(|[x, y, z]| [1.0 - x, y, z]);
    packet.mirrored = true;
    let mut mirrored = Pipeline::new(StyleParams::default());
    mirrored.set_resolution(RES);
    let out_mirrored = run_frame(&mut mirrored, &packet);

    // The effect must actually be visible for the comparison to mean anything.
    assert!(max_channel_diff(&out_plain, &base_frame()) > 0);

    let mut max = 0u8;
    for y in 0..RES.height() {
        for x in 0..RES.width() {
            let a = out_plain.get(x, y);
            let b = out_mirrored.get(RES.width() - 1 - x, y);
            for d in [
                a.r().abs_diff(b.r()),
                a.g().abs_diff(b.g()),
                a.b().abs_diff(b.b()),
            ] {
                max = max.max(d);
            }
        }
    }
    assert!(max <= 2, "flip mismatch up to {max}");
}
