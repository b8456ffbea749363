//! Per-frame orchestration of the sculpting stages.
//!
//! [`Pipeline`] owns every piece of mutable state the engine carries across frames:
//! the anchor filter bank, the strength modulator, the mask buffers with their
//! temporal history, and the confidence fade. Callers push a [`FramePacket`] plus the
//! matching video frame into [`Pipeline::process`] once per frame; everything else is
//! derived from that.
//!
//! The pipeline is deliberately single-threaded. All state lives on the thread that
//! calls `process`; use [`crate::feed`] to hand packets over from a tracker thread.

use crate::anchor::{derive, AnchorFilter, AnchorSet};
use crate::blur::MaskBlur;
use crate::composite;
use crate::config::{StyleParams, Tuning};
use crate::coord::CoordMap;
use crate::draw;
use crate::filter::{AsymmetricEma, EmaState, OneEuroFilter, TimeBasedFilter, TimedEma};
use crate::image::Image;
use crate::landmark::{FramePacket, Landmarks, NUM_LANDMARKS};
use crate::mask::{mask_resolution, MaskBuffer, MaskRasterizer};
use crate::num::lerp;
use crate::pose;
use crate::region::PerRegion;
use crate::resolution::Resolution;
use crate::stabilize::{blend_weight, TemporalStabilizer};
use crate::strength::{RegionStrengths, SceneMetrics, StrengthModulator};
use crate::timer::Timer;

/// Frame interval assumed for the very first packet, in seconds.
const DEFAULT_DT: f32 = 1.0 / 30.0;

/// Scene luminance assumed until a video frame has been sampled (mask-only mode).
const NEUTRAL_LUMA: f32 = 0.5;

/// Buffers tied to a specific output resolution.
struct Buffers {
    resolution: Resolution,
    mask: MaskBuffer,
    stabilizer: TemporalStabilizer,
}

/// The sculpting engine: feed it landmark packets, it shades video frames.
///
/// ```
/// # use kage::config::StyleParams;
/// # use kage::image::{Color, Image};
/// # use kage::pipeline::Pipeline;
/// # use kage::resolution::Resolution;
/// # use kage::synth::SyntheticFace;
/// let mut pipeline = Pipeline::new(StyleParams::default());
/// pipeline.set_resolution(Resolution::RES_720P);
///
/// let face = SyntheticFace::new();
/// let mut frame = Image::filled(1280, 720, Color::from_rgb8(180, 150, 130));
/// pipeline.process(&face.packet(0.0), &mut frame);
/// ```
pub struct Pipeline {
    style: StyleParams,
    tuning: Tuning,
    bufs: Option<Buffers>,

    anchor_filter: AnchorFilter,
    modulator: StrengthModulator,
    rasterizer: MaskRasterizer,
    blur: MaskBlur,

    fade: AsymmetricEma,
    fade_state: EmaState,
    fade_value: f32,
    luma_ema: TimedEma,
    luma_state: EmaState,

    /// Owned landmark copy, reused every frame so sanitization never touches the input.
    scratch: Landmarks,
    anchors: Option<AnchorSet>,
    strengths: RegionStrengths,
    last_timestamp: Option<f64>,
    last_valid: Option<f64>,
    debug_overlay: bool,

    t_derive: Timer,
    t_rasterize: Timer,
    t_blur: Timer,
    t_composite: Timer,
}

impl Pipeline {
    pub fn new(style: StyleParams) -> Self {
        Self::with_tuning(style, Tuning::default())
    }

    /// Creates a pipeline with a custom tuning table.
    pub fn with_tuning(style: StyleParams, tuning: Tuning) -> Self {
        let style = style.clamped();
        let fade = AsymmetricEma::new(tuning.fade_tau_up, tuning.fade_tau_down);
        let mut fade_state = EmaState::default();
        // Seed at zero so the overlay fades in once tracking starts instead of popping.
        fade.filter(&mut fade_state, 0.0, 0.0);
        Self {
            anchor_filter: AnchorFilter::new(landmark_filter(&style, &tuning)),
            modulator: StrengthModulator::new(&tuning),
            rasterizer: MaskRasterizer::new(),
            blur: MaskBlur::new(),
            fade,
            fade_state,
            fade_value: 0.0,
            luma_ema: TimedEma::new(tuning.luma_tau),
            luma_state: EmaState::default(),
            scratch: Landmarks::new(NUM_LANDMARKS),
            anchors: None,
            strengths: RegionStrengths {
                region: PerRegion::default(),
                side: [0.0; 2],
            },
            last_timestamp: None,
            last_valid: None,
            debug_overlay: false,
            bufs: None,
            t_derive: Timer::new("derive"),
            t_rasterize: Timer::new("rasterize"),
            t_blur: Timer::new("blur"),
            t_composite: Timer::new("composite"),
            style,
            tuning,
        }
    }

    /// Declares the output resolution, allocating the mask buffers for it.
    ///
    /// Calling this again with the unchanged resolution is a no-op; an actual change
    /// drops the temporal mask history and takes effect with the next packet.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        assert!(!resolution.is_empty());
        if self.bufs.as_ref().map(|bufs| bufs.resolution) == Some(resolution) {
            return;
        }
        let mask_res = mask_resolution(resolution, &self.tuning);
        log::debug!("output resolution {resolution}, mask resolution {mask_res}");
        self.bufs = Some(Buffers {
            resolution,
            mask: MaskBuffer::new(mask_res),
            stabilizer: TemporalStabilizer::new(mask_res),
        });
    }

    /// Replaces the style parameters, clamped to their documented ranges.
    ///
    /// Filter histories are kept, so adjusting sliders mid-stream never makes the
    /// overlay jump.
    pub fn set_style(&mut self, style: StyleParams) {
        self.style = style.clamped();
        self.anchor_filter
            .set_params(landmark_filter(&self.style, &self.tuning));
    }

    pub fn style(&self) -> &StyleParams {
        &self.style
    }

    /// Whether frames can be processed, i.e. a resolution has been established.
    pub fn ready(&self) -> bool {
        self.bufs.is_some()
    }

    /// The current tracking confidence in `[0, 1]`.
    ///
    /// Rises while a face is tracked and falls after tracking is lost; the overlay is
    /// scaled by this value, so `0.0` means the output frame passes through untouched.
    pub fn confidence(&self) -> f32 {
        self.fade_value
    }

    /// The smoothed anchor geometry of the most recent tracked frame.
    pub fn anchors(&self) -> Option<&AnchorSet> {
        self.anchors.as_ref()
    }

    /// The most recent stabilized mask.
    pub fn mask(&self) -> Option<&MaskBuffer> {
        self.bufs.as_ref().and_then(|bufs| bufs.stabilizer.current())
    }

    /// Draws the anchor geometry on top of every composited frame, for debugging.
    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    /// Profiling timers of the per-frame stages.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [
            &self.t_derive,
            &self.t_rasterize,
            &self.t_blur,
            &self.t_composite,
        ]
    }

    /// Processes one packet and shades `frame` in place.
    ///
    /// Returns `false` with the frame untouched while no resolution is set, `frame`
    /// does not match it, or no face has been seen yet. Callers display the frame
    /// either way; `false` just means it is still the unmodified camera image.
    pub fn process(&mut self, packet: &FramePacket, frame: &mut Image) -> bool {
        match &self.bufs {
            Some(bufs) if bufs.resolution == frame.resolution() => {}
            Some(bufs) => {
                log::warn!(
                    "frame is {} but the pipeline is configured for {}, call `set_resolution`",
                    frame.resolution(),
                    bufs.resolution,
                );
                return false;
            }
            None => return false,
        }

        let luma = frame.mean_luma();
        if !self.advance(packet, Some(luma)) {
            return false;
        }
        let Some(bufs) = &self.bufs else { return false };
        let Some(mask) = bufs.stabilizer.current() else {
            return false;
        };
        let Some(anchors) = &self.anchors else {
            return false;
        };

        let guard = self.t_composite.start();
        composite::composite(
            frame,
            mask,
            packet.mirrored,
            &self.strengths,
            &self.style,
            self.fade_value,
        );
        drop(guard);

        if self.debug_overlay {
            let map = CoordMap::new(frame.resolution(), packet.mirrored);
            draw::draw_anchors(frame, anchors, &map);
        }
        true
    }

    /// Processes one packet without compositing, for callers that render the mask
    /// themselves.
    ///
    /// The returned mask stays valid until the next `process` call. Scene luminance
    /// keeps its last smoothed value since there is no frame to sample.
    pub fn process_mask(&mut self, packet: &FramePacket) -> Option<&MaskBuffer> {
        if !self.advance(packet, None) {
            return None;
        }
        self.bufs.as_ref().and_then(|bufs| bufs.stabilizer.current())
    }

    /// Runs the landmark-to-mask stages for one packet.
    ///
    /// Returns `true` when a stabilized mask is available afterwards, possibly a stale
    /// one while tracking is lost.
    fn advance(&mut self, packet: &FramePacket, luma_sample: Option<f32>) -> bool {
        let Some(bufs) = &mut self.bufs else {
            return false;
        };

        let elapsed = match self.last_timestamp {
            Some(last) => (packet.timestamp - last).max(0.0) as f32,
            None => DEFAULT_DT,
        };
        self.last_timestamp = Some(packet.timestamp);

        let luma = match luma_sample {
            Some(sample) => self.luma_ema.filter(&mut self.luma_state, sample, elapsed),
            None => self.luma_state.get().unwrap_or(NEUTRAL_LUMA),
        };

        let valid = packet.tracking && packet.landmarks.len() == NUM_LANDMARKS;
        if packet.tracking && !valid {
            log::trace!(
                "dropping packet with {} landmarks (expected {NUM_LANDMARKS})",
                packet.landmarks.len(),
            );
        }

        let target = if valid { 1.0 } else { 0.0 };
        self.fade_value = self.fade.filter(&mut self.fade_state, target, elapsed);

        if !valid {
            // Tracking loss keeps the last mask on screen while the fade ramps down.
            return self.anchors.is_some() && bufs.stabilizer.current().is_some();
        }

        if let Some(last) = self.last_valid {
            let gap = packet.timestamp - last;
            if gap > f64::from(self.tuning.tracking_timeout) {
                log::debug!("tracking gap of {gap:.2}s, re-seeding filter state");
                self.anchor_filter.reset();
                self.modulator.reset();
                bufs.stabilizer.reset();
            }
        }
        self.last_valid = Some(packet.timestamp);

        let map = CoordMap::new(bufs.resolution, packet.mirrored);
        self.scratch
            .positions_mut()
            .copy_from_slice(packet.landmarks.positions());
        self.scratch.sanitize();
        map.unmirror(&mut self.scratch);

        let guard = self.t_derive.start();
        let mut anchors = derive::derive_raw(&self.scratch, &map, &self.style, &self.tuning);
        self.anchor_filter.apply(&mut anchors, elapsed);
        derive::place_nostrils(&mut anchors, &map);
        drop(guard);

        let pose = pose::estimate(&self.scratch, &map, &self.tuning);
        let metrics = SceneMetrics {
            face_width: anchors.face_width(&map),
            luma,
            nose_x: anchors.nose_tip.x,
        };
        self.strengths = self.modulator.compute(&metrics, &pose, &self.style, elapsed);

        let guard = self.t_rasterize.start();
        let enables = PerRegion::from_fn(|region| {
            self.strengths.enabled(region, self.tuning.enable_epsilon)
        });
        self.rasterizer.rasterize(
            &mut bufs.mask,
            &anchors,
            enables,
            self.strengths.side,
            &self.tuning,
        );
        drop(guard);

        let guard = self.t_blur.start();
        let mask_map = CoordMap::new(bufs.mask.resolution(), false);
        let sigma = MaskBlur::sigma_for(
            mask_map.metric_len_to_px(metrics.face_width),
            self.style.softness,
            bufs.mask.resolution(),
            &self.tuning,
        );
        self.blur.blur(&mut bufs.mask, sigma);
        drop(guard);

        let weight = blend_weight(self.style.temporal_smoothing, &self.tuning);
        bufs.stabilizer.stabilize(&bufs.mask, weight);

        self.anchors = Some(anchors);
        true
    }
}

/// Maps the landmark smoothing weight to one-euro parameters.
fn landmark_filter(style: &StyleParams, tuning: &Tuning) -> OneEuroFilter {
    let cutoff = lerp(
        tuning.cutoff_light,
        tuning.cutoff_heavy,
        style.landmark_smoothing,
    );
    OneEuroFilter::new(cutoff, tuning.filter_beta).with_d_cutoff(tuning.filter_d_cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Color;
    use crate::synth::SyntheticFace;

    const RES: Resolution = Resolution::new(320, 240);

    fn test_frame() -> Image {
        Image::filled(RES.width(), RES.height(), Color::from_rgb8(180, 150, 130))
    }

    #[test]
    fn not_ready_until_resolution_is_set() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        assert!(!pipeline.ready());

        let face = SyntheticFace::new();
        let mut frame = test_frame();
        assert!(!pipeline.process(&face.packet(0.0), &mut frame));
        assert_eq!(frame.get(10, 10), Color::from_rgb8(180, 150, 130));
        assert!(pipeline.process_mask(&face.packet(0.0)).is_none());

        pipeline.set_resolution(RES);
        assert!(pipeline.ready());
    }

    #[test]
    fn first_tracked_frame_produces_output() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mut frame = test_frame();
        assert!(pipeline.process(&face.packet(0.0), &mut frame));
        assert!(pipeline.mask().is_some());
        assert!(pipeline.anchors().is_some());
        assert!(pipeline.confidence() > 0.0);
    }

    #[test]
    fn mismatched_frame_is_rejected() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mut frame = Image::filled(64, 64, Color::from_rgb8(180, 150, 130));
        assert!(!pipeline.process(&face.packet(0.0), &mut frame));
    }

    #[test]
    fn lost_tracking_reuses_the_previous_mask() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mut frame = test_frame();
        assert!(pipeline.process(&face.packet_at(0, 30.0), &mut frame));
        let confidence = pipeline.confidence();

        let mut lost = face.packet_at(1, 30.0);
        lost.tracking = false;
        let mut frame = test_frame();
        assert!(pipeline.process(&lost, &mut frame));
        assert!(pipeline.confidence() < confidence);
    }

    #[test]
    fn resolution_change_drops_mask_history() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mut frame = test_frame();
        assert!(pipeline.process(&face.packet(0.0), &mut frame));
        assert!(pipeline.mask().is_some());

        // Same resolution keeps the history, a new one starts from scratch.
        pipeline.set_resolution(RES);
        assert!(pipeline.mask().is_some());
        pipeline.set_resolution(Resolution::new(640, 480));
        assert!(pipeline.mask().is_none());
    }

    #[test]
    fn style_change_keeps_tracking_state() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mut frame = test_frame();
        assert!(pipeline.process(&face.packet_at(0, 30.0), &mut frame));

        let mut style = StyleParams::default();
        style.intensity = 1.0;
        style.placement = 0.4;
        pipeline.set_style(style);
        assert_eq!(pipeline.style().intensity, 1.0);

        let mut frame = test_frame();
        assert!(pipeline.process(&face.packet_at(1, 30.0), &mut frame));
        assert!(pipeline.anchors().is_some());
    }

    #[test]
    fn mask_only_mode_runs_without_frames() {
        let mut pipeline = Pipeline::new(StyleParams::default());
        pipeline.set_resolution(RES);

        let face = SyntheticFace::new();
        let mask = pipeline.process_mask(&face.packet(0.0)).expect("mask");
        let total: f32 = mask
            .data()
            .iter()
            .map(|texel| texel.iter().sum::<f32>())
            .sum();
        assert!(total > 0.0, "mask should have nonzero coverage");
    }
}
