//! Temporal stabilization of the blurred mask.

use itertools::izip;

use crate::config::Tuning;
use crate::mask::MaskBuffer;
use crate::num::{clamp01, lerp};
use crate::resolution::Resolution;

/// Maps the user `temporal_smoothing` control to the per-frame blend weight.
///
/// At 0 the new mask replaces the old one outright; at 1 only a small fraction of the
/// difference is taken per frame.
pub fn blend_weight(temporal_smoothing: f32, tuning: &Tuning) -> f32 {
    lerp(1.0, tuning.stabilize_weight_min, clamp01(temporal_smoothing))
}

/// One-pole blend of each texel against the previous frame's output.
///
/// The two history buffers are swapped each frame instead of copied. A fresh or resized
/// stabilizer passes the first mask through unchanged.
pub struct TemporalStabilizer {
    buffers: [MaskBuffer; 2],
    current: usize,
    primed: bool,
}

impl TemporalStabilizer {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            buffers: [MaskBuffer::new(resolution), MaskBuffer::new(resolution)],
            current: 0,
            primed: false,
        }
    }

    /// Blends `new_mask` against the previous output and returns the stabilized frame.
    ///
    /// `weight` is the fraction of the difference taken this frame, in `[0, 1]`.
    pub fn stabilize(&mut self, new_mask: &MaskBuffer, weight: f32) -> &MaskBuffer {
        let next = 1 - self.current;
        let res = new_mask.resolution();
        self.buffers[next].resize(res);

        let fresh = !self.primed || self.buffers[self.current].resolution() != res;
        if fresh {
            self.buffers[next]
                .data_mut()
                .copy_from_slice(new_mask.data());
        } else {
            let w = clamp01(weight);
            let (head, tail) = self.buffers.split_at_mut(1);
            let (prev, out) = match self.current {
                0 => (&head[0], &mut tail[0]),
                _ => (&tail[0], &mut head[0]),
            };
            for (o, p, n) in izip!(out.data_mut(), prev.data(), new_mask.data()) {
                for c in 0..4 {
                    o[c] = p[c] + (n[c] - p[c]) * w;
                }
            }
        }

        self.primed = true;
        self.current = next;
        &self.buffers[self.current]
    }

    /// The most recent stabilized mask, if any frame has been processed.
    pub fn current(&self) -> Option<&MaskBuffer> {
        self.primed.then(|| &self.buffers[self.current])
    }

    /// Forgets the mask history; the next frame passes through unchanged.
    pub fn reset(&mut self) {
        self.primed = false;
    }
}
