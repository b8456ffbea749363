//! Data filtering and smoothing.

mod ema;
mod one_euro;

pub use ema::{AsymmetricEma, Ema, EmaState, TimedEma};
pub use one_euro::{OneEuroFilter, OneEuroFilterState};

/// Base trait tying a set of filter parameters to its per-stream state.
///
/// Parameters are plain `Copy` values that can be shared by any number of streams; all
/// mutable per-stream data lives in [`FilterBase::State`].
pub trait FilterBase<V> {
    /// Mutable state needed to filter one stream of values.
    type State: Default;
}

/// A filter for values of type `V` that only looks at the values themselves, not at
/// their timing.
pub trait Filter<V>: FilterBase<V> {
    /// Feeds a new value into the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}

/// A filter for values of type `V` that incorporates the time elapsed between
/// consecutive values.
pub trait TimeBasedFilter<V>: FilterBase<V> {
    /// Feeds a new value into the filter, returning the filtered value.
    ///
    /// `elapsed` is the time since the previous value was fed, in seconds.
    fn filter(&self, state: &mut Self::State, value: V, elapsed: f32) -> V;
}
