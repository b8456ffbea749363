//! Style parameters and engine tuning.
//!
//! [`StyleParams`] is the user-facing surface: bounded floats coming from a UI or a config
//! file, never trusted and re-clamped at the pipeline boundary. [`Tuning`] collects the
//! empirical constants that define the *look* (pose thresholds, time constants, mask
//! sizing); they are compiled-in defaults meant to be re-tuned per product, not per user.

use serde::{Deserialize, Serialize};

/// Blend law used by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Multiplicative shading. Reads as a true shadow and preserves skin texture.
    #[default]
    Multiply,
    /// W3C soft-light law. Softer, more diffuse look.
    SoftLight,
}

/// User-facing effect parameters.
///
/// All fields are bounded; [`StyleParams::clamped`] is applied whenever a value enters the
/// pipeline, so out-of-range or non-finite input cannot reach the render path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleParams {
    /// Master intensity gating every region, in `[0, 1]`.
    pub intensity: f32,
    /// Per-region intensities, in `[0, 1]`.
    pub cheek: f32,
    pub jaw: f32,
    pub nose: f32,
    pub forehead: f32,
    /// How far below the cheekbone the contour sits, in `[0, 1]`.
    pub scale: f32,
    /// Feather/blur multiplier, in `[0, 1]`.
    pub softness: f32,
    /// Shifts contour ribbons along the face-down direction, in `[-1, 1]`. Exclusion
    /// shapes are never moved by this.
    pub placement: f32,
    /// Cool/warm bias of the shade color, in `[-1, 1]`.
    pub warmth: f32,
    /// How strongly the shade is colored instead of neutral gray, in `[0, 1]`.
    pub tint: f32,
    pub blend_mode: BlendMode,
    /// Temporal mask smoothing, in `[0, 1]`. 0 disables frame-to-frame blending.
    pub temporal_smoothing: f32,
    /// Anchor smoothing aggressiveness, in `[0, 1]`.
    pub landmark_smoothing: f32,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            intensity: 0.6,
            cheek: 1.0,
            jaw: 0.85,
            nose: 0.7,
            forehead: 0.6,
            scale: 0.5,
            softness: 0.5,
            placement: 0.0,
            warmth: 0.15,
            tint: 0.35,
            blend_mode: BlendMode::Multiply,
            temporal_smoothing: 0.65,
            landmark_smoothing: 0.5,
        }
    }
}

impl StyleParams {
    /// Returns a copy with every field forced into its documented range.
    ///
    /// Non-finite values fall back to the field's default.
    pub fn clamped(self) -> Self {
        let d = Self::default();
        Self {
            intensity: bounded(self.intensity, 0.0, 1.0, d.intensity),
            cheek: bounded(self.cheek, 0.0, 1.0, d.cheek),
            jaw: bounded(self.jaw, 0.0, 1.0, d.jaw),
            nose: bounded(self.nose, 0.0, 1.0, d.nose),
            forehead: bounded(self.forehead, 0.0, 1.0, d.forehead),
            scale: bounded(self.scale, 0.0, 1.0, d.scale),
            softness: bounded(self.softness, 0.0, 1.0, d.softness),
            placement: bounded(self.placement, -1.0, 1.0, d.placement),
            warmth: bounded(self.warmth, -1.0, 1.0, d.warmth),
            tint: bounded(self.tint, 0.0, 1.0, d.tint),
            blend_mode: self.blend_mode,
            temporal_smoothing: bounded(self.temporal_smoothing, 0.0, 1.0, d.temporal_smoothing),
            landmark_smoothing: bounded(self.landmark_smoothing, 0.0, 1.0, d.landmark_smoothing),
        }
    }
}

fn bounded(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        fallback
    }
}

/// Compiled-in look constants.
///
/// The pose thresholds and time constants here were tuned by eye against webcam footage;
/// none of them is an algorithmic requirement.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    /// Pitch magnitude (degrees) where pose modulation starts to react.
    pub pitch_onset_deg: f32,
    /// Pitch magnitude (degrees) where pose modulation saturates.
    pub pitch_saturation_deg: f32,
    /// Pitch (degrees) to treat as neutral. Measured pitch is recentered by this before
    /// easing, so a camera mounted below eye level can be compensated for.
    pub pitch_rest_deg: f32,
    /// Yaw magnitude (degrees) treated as a fully turned head.
    pub yaw_saturation_deg: f32,

    /// Seconds without a tracking-valid packet before all filter state is re-seeded.
    pub tracking_timeout: f32,
    /// Confidence fade time constants, seconds. Falling is faster than rising.
    pub fade_tau_up: f32,
    pub fade_tau_down: f32,
    /// Region strength smoothing time constant, seconds.
    pub strength_tau: f32,
    /// Scene luminance smoothing time constant, seconds.
    pub luma_tau: f32,

    /// Anchor filter cutoff (Hz) at `landmark_smoothing` 0 and 1.
    pub cutoff_light: f32,
    pub cutoff_heavy: f32,
    /// Anchor filter speed coefficient.
    pub filter_beta: f32,
    /// Anchor filter derivative cutoff (Hz).
    pub filter_d_cutoff: f32,

    /// Mask resolution as a fraction of the output height, with absolute bounds.
    pub mask_scale: f32,
    pub mask_min_px: u32,
    pub mask_max_px: u32,
    /// Clip silhouette erosion, metric units.
    pub clip_erosion: f32,
    /// Forehead ribbon inset toward the face center, as a blend fraction.
    pub forehead_inset: f32,
    /// Contour feather as a fraction of face width.
    pub feather_frac: f32,
    /// Blur sigma as a fraction of face width in pixels.
    pub blur_frac: f32,
    /// Stabilizer blend weight at `temporal_smoothing` 1 (weight is 1 at 0).
    pub stabilize_weight_min: f32,
    /// Region strengths below this never rasterize.
    pub enable_epsilon: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pitch_onset_deg: 8.0,
            pitch_saturation_deg: 28.0,
            pitch_rest_deg: 0.0,
            yaw_saturation_deg: 35.0,

            tracking_timeout: 0.35,
            fade_tau_up: 0.35,
            fade_tau_down: 0.12,
            strength_tau: 0.3,
            luma_tau: 0.5,

            cutoff_light: 4.0,
            cutoff_heavy: 0.6,
            filter_beta: 0.08,
            filter_d_cutoff: 1.0,

            mask_scale: 0.5,
            mask_min_px: 96,
            mask_max_px: 480,
            clip_erosion: 0.012,
            forehead_inset: 0.06,
            feather_frac: 0.16,
            blur_frac: 0.06,
            stabilize_weight_min: 0.12,
            enable_epsilon: 0.01,
        }
    }
}
