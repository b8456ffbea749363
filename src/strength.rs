//! Per-region effect strength, modulated by face size, lighting and pose.
//!
//! The style sliders say how strong the user wants each region; this module decides how
//! strong the current frame can carry it. Every modifier is a bounded multiplier, and the
//! result is smoothed with a wall-clock EMA so strength never pumps when the inputs
//! flicker frame to frame.

use crate::config::{StyleParams, Tuning};
use crate::filter::{EmaState, TimeBasedFilter, TimedEma};
use crate::num::{lerp, smoothstep};
use crate::pose::PoseEstimate;
use crate::region::{PerRegion, Region, Side};

/// Face width (metric units) of a typical head framed for a video call. Smaller measured
/// faces get boosted toward [`SIZE_BOOST_MAX`].
const REF_FACE_WIDTH: f32 = 0.28;
const SIZE_BOOST_MAX: f32 = 1.3;

/// Strength multiplier left in near darkness. Contour shading reads harsh in dim light.
const DIM_LIGHT_FLOOR: f32 = 0.55;
const LUMA_DIM: f32 = 0.08;
const LUMA_LIT: f32 = 0.35;

/// Nose shading keeps this fraction of its strength when the nose tip sits far from the
/// image center.
const NOSE_OFFCENTER_FLOOR: f32 = 0.4;
const NOSE_CENTER_TOL: f32 = 0.12;
const NOSE_CENTER_MAX: f32 = 0.3;

/// Visibility of the averted cheek at a fully turned head.
const FAR_SIDE_MIN: f32 = 0.15;

/// Scene measurements feeding the modulation, gathered by the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct SceneMetrics {
    /// Measured ear-to-ear face width in metric units.
    pub face_width: f32,
    /// Mean scene luminance in `[0, 1]`, already smoothed upstream.
    pub luma: f32,
    /// Normalized x position of the smoothed nose tip.
    pub nose_x: f32,
}

/// Smoothed output strengths for one frame.
#[derive(Debug, Clone, Copy)]
pub struct RegionStrengths {
    /// Effective strength per region, in `[0, 1]`.
    pub region: PerRegion<f32>,
    /// Per-side visibility weight, indexed by [`Side::index`].
    pub side: [f32; 2],
}

impl RegionStrengths {
    /// Whether a region contributes visibly at all this frame.
    pub fn enabled(&self, region: Region, epsilon: f32) -> bool {
        self.region[region] > epsilon
    }
}

/// Stateful strength computation. One instance per pipeline.
#[derive(Debug)]
pub struct StrengthModulator {
    ema: TimedEma,
    regions: PerRegion<EmaState>,
    sides: [EmaState; 2],
}

impl StrengthModulator {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            ema: TimedEma::new(tuning.strength_tau),
            regions: PerRegion::default(),
            sides: Default::default(),
        }
    }

    /// Computes this frame's strengths and advances the smoothing state.
    ///
    /// `elapsed` is the time since the previous frame, in seconds.
    pub fn compute(
        &mut self,
        metrics: &SceneMetrics,
        pose: &PoseEstimate,
        style: &StyleParams,
        elapsed: f32,
    ) -> RegionStrengths {
        let size = (REF_FACE_WIDTH / metrics.face_width.max(0.05)).clamp(1.0, SIZE_BOOST_MAX);
        let light = lerp(DIM_LIGHT_FLOOR, 1.0, smoothstep(LUMA_DIM, LUMA_LIT, metrics.luma));
        let centered = 1.0 - smoothstep(NOSE_CENTER_TOL, NOSE_CENTER_MAX, (metrics.nose_x - 0.5).abs());

        let raw = PerRegion::from_fn(|region| {
            let pose_mul = match region {
                Region::Cheeks => 1.0 + 0.35 * pose.low_angle + 0.2 * pose.high_angle,
                Region::Jaw => (1.0 + 0.3 * pose.low_angle) * (1.0 - 0.45 * pose.high_angle),
                Region::Nose => (1.0 - 0.85 * pose.turn) * lerp(NOSE_OFFCENTER_FLOOR, 1.0, centered),
                Region::Forehead => 1.0,
            };
            (region.base_strength(style) * size * light * pose_mul).clamp(0.0, 1.0)
        });

        let far = lerp(1.0, FAR_SIDE_MIN, pose.turn);
        let (left, right) = if pose.yaw >= 0.0 { (far, 1.0) } else { (1.0, far) };

        let ema = self.ema;
        let regions = &mut self.regions;
        RegionStrengths {
            region: PerRegion::from_fn(|r| ema.filter(&mut regions[r], raw[r], elapsed)),
            side: [
                ema.filter(&mut self.sides[Side::Left.index()], left, elapsed),
                ema.filter(&mut self.sides[Side::Right.index()], right, elapsed),
            ],
        }
    }

    /// Drops all smoothing history. The next [`Self::compute`] passes through unsmoothed.
    pub fn reset(&mut self) {
        self.regions = PerRegion::default();
        self.sides = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral_pose() -> PoseEstimate {
        PoseEstimate {
            roll: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            low_angle: 0.0,
            high_angle: 0.0,
            turn: 0.0,
        }
    }

    fn metrics() -> SceneMetrics {
        SceneMetrics {
            face_width: 0.3,
            luma: 0.5,
            nose_x: 0.5,
        }
    }

    fn fresh() -> StrengthModulator {
        StrengthModulator::new(&Tuning::default())
    }

    #[test]
    fn neutral_frame_matches_style_sliders() {
        let style = StyleParams::default();
        let out = fresh().compute(&metrics(), &neutral_pose(), &style, 1.0 / 30.0);
        for region in Region::ALL {
            assert_eq!(out.region[region], region.base_strength(&style));
        }
        assert_eq!(out.side, [1.0, 1.0]);
    }

    #[test]
    fn dim_light_attenuates_all_regions() {
        let style = StyleParams::default();
        let lit = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let dim_metrics = SceneMetrics { luma: 0.02, ..metrics() };
        let dim = fresh().compute(&dim_metrics, &neutral_pose(), &style, 0.03);
        for region in Region::ALL {
            assert!(dim.region[region] < lit.region[region]);
            assert!(dim.region[region] >= DIM_LIGHT_FLOOR * lit.region[region] - 1e-6);
        }
    }

    #[test]
    fn small_faces_get_boosted() {
        let style = StyleParams::default();
        let near = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let far_metrics = SceneMetrics { face_width: 0.1, ..metrics() };
        let far = fresh().compute(&far_metrics, &neutral_pose(), &style, 0.03);
        let ratio = far.region[Region::Cheeks] / near.region[Region::Cheeks];
        assert!((ratio - SIZE_BOOST_MAX).abs() < 1e-4);
    }

    #[test]
    fn turned_head_drops_nose_and_far_side() {
        let style = StyleParams::default();
        let frontal = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let pose = PoseEstimate { yaw: 0.6, turn: 1.0, ..neutral_pose() };
        let turned = fresh().compute(&metrics(), &pose, &style, 0.03);
        assert!(turned.region[Region::Nose] < 0.25 * frontal.region[Region::Nose]);
        // Positive yaw turns the left side of the image away.
        assert!((turned.side[Side::Left.index()] - FAR_SIDE_MIN).abs() < 1e-5);
        assert_eq!(turned.side[Side::Right.index()], 1.0);
    }

    #[test]
    fn low_angle_adds_definition() {
        let style = StyleParams::default();
        let neutral = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let pose = PoseEstimate { low_angle: 1.0, ..neutral_pose() };
        let low = fresh().compute(&metrics(), &pose, &style, 0.03);
        assert!(low.region[Region::Cheeks] > neutral.region[Region::Cheeks]);
        assert!(low.region[Region::Jaw] > neutral.region[Region::Jaw]);
        assert_eq!(low.region[Region::Forehead], neutral.region[Region::Forehead]);
    }

    #[test]
    fn high_angle_trades_jaw_for_cheeks() {
        let style = StyleParams::default();
        let neutral = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let pose = PoseEstimate { high_angle: 1.0, ..neutral_pose() };
        let high = fresh().compute(&metrics(), &pose, &style, 0.03);
        assert!(high.region[Region::Jaw] < neutral.region[Region::Jaw]);
        assert!(high.region[Region::Cheeks] > neutral.region[Region::Cheeks]);
    }

    #[test]
    fn off_center_nose_is_attenuated() {
        let style = StyleParams::default();
        let centered = fresh().compute(&metrics(), &neutral_pose(), &style, 0.03);
        let off_metrics = SceneMetrics { nose_x: 0.88, ..metrics() };
        let off = fresh().compute(&off_metrics, &neutral_pose(), &style, 0.03);
        let ratio = off.region[Region::Nose] / centered.region[Region::Nose];
        assert!((ratio - NOSE_OFFCENTER_FLOOR).abs() < 1e-4);
    }

    #[test]
    fn sudden_input_change_moves_output_gradually() {
        let style = StyleParams::default();
        let mut modulator = fresh();
        let lit = modulator.compute(&metrics(), &neutral_pose(), &style, 0.03);
        let dim_metrics = SceneMetrics { luma: 0.0, ..metrics() };
        let step = modulator.compute(&dim_metrics, &neutral_pose(), &style, 0.03);
        let target = fresh().compute(&dim_metrics, &neutral_pose(), &style, 0.03);
        let region = Region::Cheeks;
        assert!(step.region[region] < lit.region[region]);
        assert!(step.region[region] > target.region[region]);
    }

    #[test]
    fn reset_forgets_smoothing_history() {
        let style = StyleParams::default();
        let mut modulator = fresh();
        modulator.compute(&metrics(), &neutral_pose(), &style, 0.03);
        modulator.reset();
        let dim_metrics = SceneMetrics { luma: 0.0, ..metrics() };
        let after = modulator.compute(&dim_metrics, &neutral_pose(), &style, 0.03);
        let target = fresh().compute(&dim_metrics, &neutral_pose(), &style, 0.03);
        assert_eq!(after.region[Region::Cheeks], target.region[Region::Cheeks]);
    }

    #[test]
    fn extremes_stay_bounded() {
        let mut style = StyleParams::default();
        style.intensity = 1.0;
        style.cheek = 1.0;
        let wild = SceneMetrics {
            face_width: 0.001,
            luma: 0.0,
            nose_x: 1.0,
        };
        let pose = PoseEstimate {
            yaw: -1.2,
            low_angle: 1.0,
            high_angle: 1.0,
            turn: 1.0,
            ..neutral_pose()
        };
        let out = fresh().compute(&wild, &pose, &style, 0.03);
        for region in Region::ALL {
            let s = out.region[region];
            assert!(s.is_finite() && (0.0..=1.0).contains(&s));
        }
        for side in out.side {
            assert!((FAR_SIDE_MIN..=1.0).contains(&side));
        }
    }

    #[test]
    fn stacked_boosts_saturate_at_unity() {
        let mut style = StyleParams::default();
        style.intensity = 1.0;
        style.cheek = 1.0;
        let near = SceneMetrics {
            face_width: 0.05,
            luma: 1.0,
            nose_x: 0.5,
        };
        let pose = PoseEstimate {
            low_angle: 1.0,
            ..neutral_pose()
        };
        // Slider, size boost and pose boost multiply out well past 1.
        let out = fresh().compute(&near, &pose, &style, 0.03);
        assert_eq!(out.region[Region::Cheeks], 1.0);
    }
}
