//! Separable Gaussian blur for the mask.

use crate::config::Tuning;
use crate::mask::MaskBuffer;
use crate::resolution::Resolution;

/// Blurs all four mask channels with a two-pass Gaussian.
///
/// Kernel and intermediate buffer are kept between frames so blurring does not allocate
/// once the mask size settles.
pub struct MaskBlur {
    kernel: Vec<f32>,
    scratch: Vec<[f32; 4]>,
}

impl MaskBlur {
    pub fn new() -> Self {
        Self {
            kernel: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Chooses the blur sigma in mask pixels.
    ///
    /// Sigma scales with the on-screen face width and the user softness, clamped against
    /// both a fraction of the face width (no hard edges, no feature loss) and a fraction
    /// of the mask resolution.
    pub fn sigma_for(
        face_width_px: f32,
        softness: f32,
        mask: Resolution,
        tuning: &Tuning,
    ) -> f32 {
        let sigma = face_width_px * tuning.blur_frac * (0.5 + softness);
        let sigma = sigma.clamp(face_width_px * 0.01, face_width_px * 0.2);
        sigma.min(mask.height() as f32 * 0.1).max(0.5)
    }

    /// Blurs `mask` in place with the given sigma, clamping at the buffer edges.
    pub fn blur(&mut self, mask: &mut MaskBuffer, sigma: f32) {
        let radius = (sigma * 2.5).ceil() as i32;
        if radius < 1 {
            return;
        }
        self.build_kernel(sigma, radius);

        let (w, h) = (mask.width() as i32, mask.height() as i32);
        self.scratch.clear();
        self.scratch.resize((w * h) as usize, [0.0; 4]);

        let src = mask.data();
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 4];
                for (k, &weight) in self.kernel.iter().enumerate() {
                    let sx = (x + k as i32 - radius).clamp(0, w - 1);
                    let texel = src[(y * w + sx) as usize];
                    for c in 0..4 {
                        acc[c] += texel[c] * weight;
                    }
                }
                self.scratch[(y * w + x) as usize] = acc;
            }
        }

        let dst = mask.data_mut();
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 4];
                for (k, &weight) in self.kernel.iter().enumerate() {
                    let sy = (y + k as i32 - radius).clamp(0, h - 1);
                    let texel = self.scratch[(sy * w + x) as usize];
                    for c in 0..4 {
                        acc[c] += texel[c] * weight;
                    }
                }
                dst[(y * w + x) as usize] = acc;
            }
        }
    }

    fn build_kernel(&mut self, sigma: f32, radius: i32) {
        let denom = 2.0 * sigma * sigma;
        self.kernel.clear();
        self.kernel
            .extend((-radius..=radius).map(|i| (-((i * i) as f32) / denom).exp()));
        let sum: f32 = self.kernel.iter().sum();
        for w in &mut self.kernel {
            *w /= sum;
        }
    }
}
