//! Exponential Moving Average filters.

use super::{Filter, FilterBase, TimeBasedFilter};

/// An Exponential Moving Average (EMA) filter with a fixed per-sample weight.
///
/// Unlike [`TimedEma`] this ignores when samples arrive, which fits streams without a
/// meaningful clock, like per-operation timings.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// The `alpha` parameter must be between 0.0 and 1.0 and defines how quickly the
    /// weight of older values should decay. Values closer to 1.0 favor recent values
    /// over older values.
    ///
    /// # Panics
    ///
    /// This method will panic if `alpha` is not in between 0.0 and 1.0.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha));
        Self { alpha }
    }
}

impl FilterBase<f32> for Ema {
    type State = EmaState;
}

impl Filter<f32> for Ema {
    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        match state.last {
            Some(last) => {
                let avg = self.alpha * value + (1.0 - self.alpha) * last;
                state.last = Some(avg);
                avg
            }
            None => {
                state.last = Some(value);
                value
            }
        }
    }
}

/// One-pole exponential smoothing towards the input.
///
/// The per-step blend factor is derived from the elapsed time and a fixed time constant,
/// so the smoothing speed is independent of the frame rate.
#[derive(Debug, Clone, Copy)]
pub struct TimedEma {
    tau: f32,
}

impl TimedEma {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// `tau` is the time constant in seconds: when the input changes, roughly 63% of the
    /// difference is covered after `tau` seconds, 95% after `3 * tau` seconds.
    ///
    /// # Panics
    ///
    /// This method will panic if `tau` is not greater than 0.0.
    pub fn new(tau: f32) -> Self {
        assert!(tau > 0.0);
        Self { tau }
    }
}

/// Filter state for [`TimedEma`] and [`AsymmetricEma`] filters.
#[derive(Debug, Clone, Default)]
pub struct EmaState {
    last: Option<f32>,
}

impl EmaState {
    /// Forgets the accumulated average; the next value passes through unchanged.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns the current smoothed value, or `None` if no value was fed yet.
    pub fn get(&self) -> Option<f32> {
        self.last
    }
}

impl FilterBase<f32> for TimedEma {
    type State = EmaState;
}

impl TimeBasedFilter<f32> for TimedEma {
    fn filter(&self, state: &mut Self::State, value: f32, elapsed: f32) -> f32 {
        blend(state, value, self.tau, elapsed)
    }
}

/// Exponential smoothing that approaches falling inputs faster than rising ones.
///
/// Used for the tracking confidence fade: losing the face dims the overlay quickly while
/// regaining it brings the overlay back gently.
#[derive(Debug, Clone, Copy)]
pub struct AsymmetricEma {
    tau_up: f32,
    tau_down: f32,
}

impl AsymmetricEma {
    /// Creates a filter with separate time constants for rising and falling inputs.
    ///
    /// # Panics
    ///
    /// This method will panic if either time constant is not greater than 0.0.
    pub fn new(tau_up: f32, tau_down: f32) -> Self {
        assert!(tau_up > 0.0);
        assert!(tau_down > 0.0);
        Self { tau_up, tau_down }
    }
}

impl FilterBase<f32> for AsymmetricEma {
    type State = EmaState;
}

impl TimeBasedFilter<f32> for AsymmetricEma {
    fn filter(&self, state: &mut Self::State, value: f32, elapsed: f32) -> f32 {
        let tau = match state.last {
            Some(last) if value < last => self.tau_down,
            _ => self.tau_up,
        };
        blend(state, value, tau, elapsed)
    }
}

fn blend(state: &mut EmaState, value: f32, tau: f32, elapsed: f32) -> f32 {
    match state.last {
        Some(last) => {
            let alpha = 1.0 - (-elapsed.max(0.0) / tau).exp();
            let avg = last + (value - last) * alpha;
            state.last = Some(avg);
            avg
        }
        None => {
            state.last = Some(value);
            value
        }
    }
}
