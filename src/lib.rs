//! Kage face sculpting overlay engine.
//!
//! Kage turns the noisy landmark stream of an external face tracker into a temporally
//! stable contour/blush shading overlay composited onto live video frames. The tracker
//! itself is *not* part of this crate: callers feed a [`FramePacket`] with the 478-point
//! face mesh every frame (see [`synth`] for a stand-in source), and get back a composited
//! frame or a standalone shading mask.
//!
//! The per-frame path is: anchor derivation and adaptive one-euro smoothing, pose and
//! strength modulation, mask rasterization, separable blur, temporal stabilization,
//! compositing. See [`pipeline::Pipeline`] for the orchestration entry point.
//!
//! # Coordinates
//!
//! Landmarks arrive in normalized `[0, 1]` camera space with X pointing right and Y
//! pointing *down* (image convention); Z is a relative depth proxy that decreases towards
//! the camera. "Left" and "right" are relative to the image, not from the PoV of the
//! depicted person. Mirroring (selfie view) is applied exactly once at ingestion, see
//! [`coord::CoordMap`].
//!
//! [`FramePacket`]: landmark::FramePacket

use log::LevelFilter;

pub mod anchor;
pub mod blur;
pub mod composite;
pub mod config;
pub mod coord;
pub mod draw;
pub mod feed;
pub mod filter;
pub mod image;
pub mod landmark;
pub mod mask;
pub mod num;
pub mod pipeline;
pub mod pose;
pub mod region;
pub mod resolution;
pub mod stabilize;
pub mod strength;
pub mod synth;
pub mod timer;

/// Catch-all error type for the crate's fallible setup and I/O surfaces.
///
/// The steady-state per-frame path never returns errors; degenerate input is clamped and
/// recovered locally instead.
pub type Error = Box<dyn std::error::Error + Sync + Send>;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and Kage will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
