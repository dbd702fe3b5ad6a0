//! Sound card output through cpal.
//!
//! The engine thread pushes interleaved stereo into an rtrb ring and the
//! device callback pulls from it. An empty ring plays silence.

use std::thread;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use saavy_sampler::{StereoBlock, BLOCK_SIZE};

/// Blocks of headroom between the engine and the device
const RING_BLOCKS: usize = 16;
const MAX_WAIT_ATTEMPTS: usize = 50;

pub struct AudioOut {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream: Option<cpal::Stream>,
}

impl AudioOut {
    pub fn open_default() -> EyreResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;
        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate().0 as f32
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }

    /// Start the device stream and return the sink the engine driver
    /// writes into.
    pub fn start(&mut self) -> EyreResult<impl FnMut(&StereoBlock) + Send + 'static> {
        let (producer, mut consumer) = RingBuffer::<f32>::new(BLOCK_SIZE * 2 * RING_BLOCKS);
        let channels = self.channels();

        let stream = self
            .device
            .build_output_stream(
                &self.config.clone().into(),
                move |data: &mut [f32], _| fill_from_ring(&mut consumer, data, channels),
                |err| eprintln!("Audio error: {}", err),
                None,
            )
            .wrap_err("failed to build output stream")?;
        stream.play()?;
        self.stream = Some(stream);

        let mut sink = RingSink { producer };
        Ok(move |block: &StereoBlock| sink.push(block))
    }
}

fn fill_from_ring(consumer: &mut Consumer<f32>, data: &mut [f32], channels: usize) {
    for frame in data.chunks_exact_mut(channels.max(1)) {
        // Frames are pushed as left/right pairs; never split one
        let (left, right) = if consumer.slots() >= 2 {
            (consumer.pop().unwrap_or(0.0), consumer.pop().unwrap_or(0.0))
        } else {
            (0.0, 0.0)
        };
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = if ch % 2 == 0 { left } else { right };
        }
    }
}

struct RingSink {
    producer: Producer<f32>,
}

impl RingSink {
    fn push(&mut self, block: &StereoBlock) {
        let needed = BLOCK_SIZE * 2;
        let mut attempts = 0;
        while self.producer.slots() < needed {
            if attempts >= MAX_WAIT_ATTEMPTS {
                // Device stalled; drop the block rather than block the engine
                return;
            }
            attempts += 1;
            thread::sleep(Duration::from_millis(1));
        }

        for i in 0..BLOCK_SIZE {
            let _ = self.producer.push(block.left[i]);
            let _ = self.producer.push(block.right[i]);
        }
    }
}
