//! Periodic render loop on a dedicated engine thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    error::{SamplerError, SamplerResult},
    io::block::StereoBlock,
    BLOCK_SIZE,
};

use super::Engine;

/// Owns the engine while it renders on its own thread.
///
/// Each iteration runs one [`Engine::run_block`] and hands the block to the
/// sink, then sleeps until the block's wall-clock duration has passed. The
/// duration follows the engine's current sample rate, so a rate change made
/// through a command retimes the loop from the next block. The loop ends on
/// [`BlockDriver::stop`] or when the engine shuts down.
pub struct BlockDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Engine>>,
}

impl BlockDriver {
    pub fn spawn<F>(mut engine: Engine, mut sink: F) -> SamplerResult<Self>
    where
        F: FnMut(&StereoBlock) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("saavy-engine".into())
            .spawn(move || {
                tracing::info!(
                    block_us = block_duration(engine.sample_rate()).as_micros() as u64,
                    "engine driver started"
                );
                let mut out = StereoBlock::silent();
                let mut deadline = Instant::now();

                while !flag.load(Ordering::Acquire) {
                    let running = engine.run_block(&mut out);
                    sink(&out);
                    if !running {
                        break;
                    }

                    deadline += block_duration(engine.sample_rate());
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        // Fell behind; don't try to catch up with a burst
                        deadline = now;
                    }
                }

                tracing::info!(blocks = engine.blocks_rendered(), "engine driver stopped");
                engine
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// True once the loop has exited on its own (engine shutdown).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the loop and take the engine back.
    pub fn stop(mut self) -> SamplerResult<Engine> {
        self.stop.store(true, Ordering::Release);
        let handle = self.handle.take().ok_or(SamplerError::EngineThreadPanicked)?;
        handle.join().map_err(|_| SamplerError::EngineThreadPanicked)
    }
}

fn block_duration(sample_rate: f32) -> Duration {
    Duration::from_secs_f64(BLOCK_SIZE as f64 / sample_rate as f64)
}

impl Drop for BlockDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{ClientCommand, MessageBus},
        engine::EngineConfig,
        sample::SampleStore,
    };
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn driver_renders_until_stopped_and_returns_the_engine() {
        let engine = Engine::new(EngineConfig::default(), Arc::new(SampleStore::new())).unwrap();
        let blocks = Arc::new(AtomicUsize::new(0));
        let counter = blocks.clone();

        let driver = BlockDriver::spawn(engine, move |block| {
            assert!(block.is_silent());
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        let engine = driver.stop().unwrap();

        let rendered = blocks.load(Ordering::Relaxed);
        assert!(rendered > 0, "driver should have rendered something");
        assert_eq!(engine.blocks_rendered(), rendered as u64);
    }

    #[test]
    fn block_duration_tracks_sample_rate() {
        let micros = |rate| block_duration(rate).as_secs_f64() * 1e6;
        assert!((micros(64_000.0) - 1_000.0).abs() < 1.0);
        assert!((micros(6_400.0) - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn sample_rate_changes_retime_the_loop() {
        let (bus, endpoint) = MessageBus::new();
        let mut engine = Engine::new(EngineConfig::default(), Arc::new(SampleStore::new())).unwrap();
        engine.attach_bus(endpoint);
        let client = bus.register_client("tempo", |_| {}).unwrap();

        let blocks = Arc::new(AtomicUsize::new(0));
        let counter = blocks.clone();
        let driver = BlockDriver::spawn(engine, move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        // 64 frames at 3.2 kHz is a 20 ms block
        client
            .post(&ClientCommand::SetSampleRate { sample_rate: 3_200.0 })
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        let before = blocks.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(200));
        let during = blocks.load(Ordering::Relaxed) - before;

        let engine = driver.stop().unwrap();
        assert_eq!(engine.sample_rate(), 3_200.0);
        // About 10 blocks; the old 48 kHz pacing would have rendered ~150
        assert!(during <= 40, "rendered {during} blocks in 200 ms");
    }
}
