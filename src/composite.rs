//! Final compositing of the stabilized mask onto a video frame.

use crate::config::{BlendMode, StyleParams};
use crate::image::Image;
use crate::mask::MaskBuffer;
use crate::num::{clamp01, lerp};
use crate::region::Region;
use crate::strength::RegionStrengths;

/// Fraction of light the shadow keeps at full mask coverage, before the warm/cool bias.
const SHADE_KEEP: f32 = 0.35;

/// How far `warmth * tint` can push the red/blue channels apart.
const SHADE_BIAS: f32 = 0.3;

/// Mask amounts below this leave the pixel untouched.
const MIN_AMOUNT: f32 = 1e-4;

/// Blends the mask into `frame` in place.
///
/// Every pixel is recomputed from the live frame content, so the result never mixes with
/// a previous output frame. The mask holds canonical (non-mirrored) geometry; `mirrored`
/// flips the sampling back into display space for selfie-view frames. `fade` is the
/// tracking-confidence factor in `[0, 1]`; at 0 the frame passes through untouched.
pub fn composite(
    frame: &mut Image,
    mask: &MaskBuffer,
    mirrored: bool,
    strengths: &RegionStrengths,
    style: &StyleParams,
    fade: f32,
) {
    if fade <= 0.0 {
        return;
    }
    let shade = shade_keep(style);
    let s = &strengths.region;
    let (width, height) = (frame.width(), frame.height());
    let data = frame.data_mut();

    for y in 0..height {
        let v = (y as f32 + 0.5) / height as f32;
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let u = if mirrored { 1.0 - u } else { u };
            let m = mask.sample(u, v);
            let amount = (m[Region::Cheeks.channel()] * s[Region::Cheeks]
                + m[Region::Jaw.channel()] * s[Region::Jaw]
                + m[Region::Nose.channel()] * s[Region::Nose]
                + m[Region::Forehead.channel()] * s[Region::Forehead])
                * fade;
            let amount = amount.min(1.0);
            if amount <= MIN_AMOUNT {
                continue;
            }

            let i = ((y * width + x) * 4) as usize;
            for c in 0..3 {
                let base = f32::from(data[i + c]) / 255.0;
                let target = match style.blend_mode {
                    BlendMode::Multiply => base * shade[c],
                    BlendMode::SoftLight => soft_light(base, shade[c]),
                };
                data[i + c] = (lerp(base, target, amount) * 255.0 + 0.5) as u8;
            }
        }
    }
}

/// Per-channel keep factor of the shade color.
///
/// Warmth raises the red channel and lowers blue; tint scales how far the shade departs
/// from neutral gray.
fn shade_keep(style: &StyleParams) -> [f32; 3] {
    let warm = style.warmth * style.tint * SHADE_BIAS;
    [
        clamp01(SHADE_KEEP + warm),
        clamp01(SHADE_KEEP + warm * 0.25),
        clamp01(SHADE_KEEP - warm),
    ]
}

/// W3C soft-light blend of one channel.
fn soft_light(base: f32, source: f32) -> f32 {
    if source <= 0.5 {
        base - (1.0 - 2.0 * source) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * source - 1.0) * (d - base)
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Color;
    use crate::region::PerRegion;
    use crate::resolution::Resolution;

    use super::*;

    fn full_strengths() -> RegionStrengths {
        RegionStrengths {
            region: PerRegion::from_fn(|_| 1.0),
            side: [1.0, 1.0],
        }
    }

    fn cheek_mask(value: f32) -> MaskBuffer {
        let mut mask = MaskBuffer::new(Resolution::new(8, 4));
        for texel in mask.data_mut() {
            texel[Region::Cheeks.channel()] = value;
        }
        mask
    }

    #[test]
    fn empty_mask_leaves_frame_untouched() {
        let mut frame = Image::filled(16, 8, Color::from_rgb8(120, 90, 200));
        let mask = MaskBuffer::new(Resolution::new(8, 4));
        composite(&mut frame, &mask, false, &full_strengths(), &StyleParams::default(), 1.0);
        assert_eq!(frame.get(7, 3), Color::from_rgb8(120, 90, 200));
    }

    #[test]
    fn multiply_matches_the_shadow_law() {
        let mut frame = Image::filled(16, 8, Color::from_rgb8(200, 200, 200));
        let style = StyleParams {
            warmth: 0.0,
            tint: 0.0,
            ..StyleParams::default()
        };
        composite(&mut frame, &cheek_mask(1.0), false, &full_strengths(), &style, 1.0);
        // base * SHADE_KEEP, rounded: 200/255 * 0.35 * 255 = 70.
        let out = frame.get(8, 4);
        assert_eq!(out, Color::from_rgb8(70, 70, 70));
        assert_eq!(out.a(), 255);
    }

    #[test]
    fn warmth_biases_red_against_blue() {
        let mut frame = Image::filled(16, 8, Color::from_rgb8(180, 180, 180));
        let style = StyleParams {
            warmth: 1.0,
            tint: 1.0,
            ..StyleParams::default()
        };
        composite(&mut frame, &cheek_mask(1.0), false, &full_strengths(), &style, 1.0);
        let out = frame.get(3, 3);
        assert!(out.r() > out.g());
        assert!(out.g() > out.b());
    }

    #[test]
    fn soft_light_darkens_less_than_multiply() {
        let style = StyleParams {
            warmth: 0.0,
            tint: 0.0,
            ..StyleParams::default()
        };
        let mut multiply = Image::filled(8, 8, Color::from_rgb8(128, 128, 128));
        composite(&mut multiply, &cheek_mask(1.0), false, &full_strengths(), &style, 1.0);

        let soft_style = StyleParams {
            blend_mode: BlendMode::SoftLight,
            ..style
        };
        let mut soft = Image::filled(8, 8, Color::from_rgb8(128, 128, 128));
        composite(&mut soft, &cheek_mask(1.0), false, &full_strengths(), &soft_style, 1.0);

        let (m, s) = (multiply.get(4, 4), soft.get(4, 4));
        assert!(m.r() < 128);
        assert!(s.r() < 128);
        assert!(s.r() > m.r());
    }

    #[test]
    fn fade_scales_the_effect() {
        let base = Color::from_rgb8(160, 160, 160);
        let style = StyleParams::default();

        let mut off = Image::filled(8, 8, base);
        composite(&mut off, &cheek_mask(1.0), false, &full_strengths(), &style, 0.0);
        assert_eq!(off.get(2, 2), base);

        let mut half = Image::filled(8, 8, base);
        composite(&mut half, &cheek_mask(1.0), false, &full_strengths(), &style, 0.5);
        let mut full = Image::filled(8, 8, base);
        composite(&mut full, &cheek_mask(1.0), false, &full_strengths(), &style, 1.0);
        assert!(full.get(2, 2).r() < half.get(2, 2).r());
        assert!(half.get(2, 2).r() < base.r());
    }

    #[test]
    fn mirrored_frame_samples_the_flipped_mask() {
        // Cheek coverage on the left mask half only.
        let mut mask = MaskBuffer::new(Resolution::new(8, 4));
        for y in 0..4 {
            for x in 0..4 {
                mask.data_mut()[(y * 8 + x) as usize][Region::Cheeks.channel()] = 1.0;
            }
        }
        let base = Color::from_rgb8(200, 200, 200);
        let style = StyleParams::default();

        let mut plain = Image::filled(16, 8, base);
        composite(&mut plain, &mask, false, &full_strengths(), &style, 1.0);
        assert!(plain.get(2, 3).r() < base.r());
        assert_eq!(plain.get(13, 3), base);

        let mut mirrored = Image::filled(16, 8, base);
        composite(&mut mirrored, &mask, true, &full_strengths(), &style, 1.0);
        assert_eq!(mirrored.get(2, 3), base);
        assert!(mirrored.get(13, 3).r() < base.r());
    }

    #[test]
    fn zero_region_strength_gates_that_region() {
        let mut frame = Image::filled(8, 8, Color::from_rgb8(160, 160, 160));
        let strengths = RegionStrengths {
            region: PerRegion::from_fn(|r| if r == Region::Cheeks { 0.0 } else { 1.0 }),
            side: [1.0, 1.0],
        };
        composite(
            &mut frame,
            &cheek_mask(1.0),
            false,
            &strengths,
            &StyleParams::default(),
            1.0,
        );
        assert_eq!(frame.get(5, 5), Color::from_rgb8(160, 160, 160));
    }
}
