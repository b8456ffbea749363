//! Demo binary: runs the sculpting pipeline against a synthetic face tracker and writes
//! a few composited frames out as PNGs.
//!
//! Pass a JSON style preset as the first argument to override the default look. Set
//! `KAGE_DEBUG_OVERLAY=1` to draw the anchor geometry on top of the output.

use std::fs;
use std::thread;
use std::time::Duration;

use kage::config::StyleParams;
use kage::feed;
use kage::image::{Color, Image};
use kage::pipeline::Pipeline;
use kage::resolution::Resolution;
use kage::synth::SyntheticFace;
use kage::timer::FpsCounter;
use kage::Error;

const RESOLUTION: Resolution = Resolution::RES_720P;
const FPS: f64 = 30.0;
const FRAMES: u32 = 90;
/// Frame indices written out as PNG snapshots (or the next processed frame after each,
/// since the feed may drop frames).
const SNAPSHOTS: &[u32] = &[0, 30, 60, 89];

fn main() -> Result<(), Error> {
    kage::init_logger!();

    let style = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => StyleParams::default(),
    };

    let mut pipeline = Pipeline::new(style);
    pipeline.set_resolution(RESOLUTION);
    pipeline.set_debug_overlay(std::env::var_os("KAGE_DEBUG_OVERLAY").is_some());

    let (sender, receiver) = feed::latest();
    let producer = thread::Builder::new().name("tracker".into()).spawn(move || {
        for frame in 0..FRAMES {
            let t = f64::from(frame) / FPS;
            // Slow yaw sweep with a bit of noise, standing in for a webcam tracker.
            let face = SyntheticFace::new()
                .with_yaw(((t * 1.2).sin() * 14.0) as f32)
                .with_jitter(0.0015);
            sender.publish(face.packet_at(frame, FPS));
            thread::sleep(Duration::from_secs_f64(1.0 / FPS));
        }
    })?;

    let mut fps = FpsCounter::new("render");
    let mut next_snapshot = 0;
    let last_timestamp = f64::from(FRAMES - 1) / FPS;
    loop {
        let Some(packet) = receiver.poll() else {
            thread::sleep(Duration::from_millis(1));
            continue;
        };

        let mut frame = Image::filled(
            RESOLUTION.width(),
            RESOLUTION.height(),
            Color::from_rgb8(184, 152, 128),
        );
        pipeline.process(&packet, &mut frame);
        fps.tick_with(pipeline.timers());

        let index = (packet.timestamp * FPS).round() as u32;
        if SNAPSHOTS.get(next_snapshot).is_some_and(|&at| index >= at) {
            let path = format!("kage-frame-{index:03}.png");
            frame.save(&path)?;
            log::info!("wrote {path} (confidence {:.2})", pipeline.confidence());
            next_snapshot += 1;
        }

        if packet.timestamp >= last_timestamp {
            break;
        }
    }

    producer.join().map_err(|_| "tracker thread panicked")?;
    Ok(())
}
