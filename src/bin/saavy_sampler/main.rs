//! saavy-sampler - console harness for the sample engine
//!
//! Run with: cargo run --features cpal
//!
//! Reads commands from stdin (type `help`), sends them over the message bus,
//! and prints whatever the engine reports back.

#[cfg(feature = "cpal")]
mod audio_out;
mod console;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use parking_lot::Mutex;
use saavy_sampler::{
    bus::{ClientCommand, EngineNotification, MessageBus},
    engine::BlockDriver,
    patch::{KeyRange, ZoneConfig},
    sample::{Sample, SampleId, SampleStore},
    Engine, EngineConfig, StereoBlock,
};

use console::{parse_line, ConsoleAction, HELP};

/// How long to give the driver thread to answer before pumping replies
const SETTLE: Duration = Duration::from_millis(15);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    patch: Option<PathBuf>,
    sample_rate: Option<f32>,
    voices: Option<usize>,
    no_driver: bool,
    verbose: u8,
}

fn parse_args() -> EyreResult<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .ok_or_else(|| eyre!("{name} needs a value"))
        };
        match flag.as_str() {
            "--config" => args.config = Some(value("--config")?.into()),
            "--patch" => args.patch = Some(value("--patch")?.into()),
            "--sample-rate" => {
                args.sample_rate = Some(value("--sample-rate")?.parse().wrap_err("bad --sample-rate")?)
            }
            "--voices" => args.voices = Some(value("--voices")?.parse().wrap_err("bad --voices")?),
            "--no-driver" => args.no_driver = true,
            "-v" => args.verbose += 1,
            "-vv" => args.verbose += 2,
            "-h" | "--help" => {
                println!(
                    "usage: saavy-sampler [--config FILE] [--patch FILE] [--sample-rate HZ] \
                     [--voices N] [--no-driver] [-v]"
                );
                std::process::exit(0);
            }
            other => return Err(eyre!("unknown argument '{other}'")),
        }
    }
    Ok(args)
}

/// One second of sine at middle C, loopable end to end.
fn test_tone(sample_rate: f32) -> Sample {
    let len = sample_rate as usize;
    // Whole number of cycles so the loop point is seamless
    let cycles = (261.63f32).round();
    let data = (0..len)
        .map(|i| 0.5 * (std::f32::consts::TAU * cycles * i as f32 / len as f32).sin())
        .collect();
    Sample::mono("test tone", sample_rate, data)
}

fn build_default_patch(engine: &mut Engine, tone: SampleId) -> EyreResult<()> {
    let group = engine.add_group(0, "tone")?;
    let mut zone = ZoneConfig::new(Some(tone), KeyRange::full(), 60);
    zone.name = "sine".into();
    zone.looping = true;
    engine.add_zone(group, zone)?;
    Ok(())
}

fn print_notification(notification: EngineNotification, pending_save: &Mutex<Option<PathBuf>>) {
    match notification {
        EngineNotification::PatchDocument { document } => match pending_save.lock().take() {
            Some(path) => match fs::write(&path, &document) {
                Ok(()) => println!("saved patch to {}", path.display()),
                Err(err) => println!("could not write {}: {err}", path.display()),
            },
            None => println!("{document}"),
        },
        EngineNotification::Status { status } => {
            println!(
                "{} Hz, voices {}/{}, parts active {}, zones {}, blocks {}",
                status.sample_rate,
                status.active_voices,
                status.max_voices,
                status.active_parts,
                status.zones,
                status.blocks_rendered
            );
        }
        EngineNotification::VoiceActivity { active_voices } => {
            println!("voices: {active_voices}");
        }
        EngineNotification::CommandFailed { command, reason } => {
            println!("{command} failed: {reason}");
        }
        other => println!("{other:?}"),
    }
}

enum Runner {
    Driver(BlockDriver),
    Manual(Box<Engine>, StereoBlock),
}

impl Runner {
    /// Let the engine see queued commands.
    fn settle(&mut self) {
        match self {
            Runner::Driver(_) => thread::sleep(SETTLE),
            Runner::Manual(engine, block) => {
                engine.run_block(block);
            }
        }
    }

    fn finish(self) -> EyreResult<Engine> {
        match self {
            Runner::Driver(driver) => Ok(driver.stop()?),
            Runner::Manual(engine, _) => Ok(*engine),
        }
    }
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let args = parse_args()?;

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<EngineConfig>(&text).wrap_err("invalid engine config")?
        }
        None => EngineConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(voices) = args.voices {
        config.max_voices = voices;
    }

    #[cfg(feature = "cpal")]
    let mut audio = if args.no_driver {
        None
    } else {
        let audio = audio_out::AudioOut::open_default()?;
        config.sample_rate = audio.sample_rate();
        println!("Output: {} Hz, {} channels", audio.sample_rate(), audio.channels());
        Some(audio)
    };

    let store = Arc::new(SampleStore::new());
    let tone = store.register(test_tone(config.sample_rate));
    let mut engine = Engine::new(config, store)?;

    match &args.patch {
        Some(path) => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            let missing = engine.load_patch(&text)?;
            if !missing.is_empty() {
                println!("patch refers to {} unregistered samples", missing.len());
            }
        }
        None => build_default_patch(&mut engine, tone)?,
    }

    let (bus, endpoint) = MessageBus::new();
    engine.attach_bus(endpoint);

    let pending_save = Arc::new(Mutex::new(None::<PathBuf>));
    let saves = pending_save.clone();
    let mut client = bus.register_client("console", move |n| print_notification(n, &saves))?;

    let mut runner = if args.no_driver {
        println!("Manual mode: 'render <n>' advances the engine");
        Runner::Manual(Box::new(engine), StereoBlock::silent())
    } else {
        #[cfg(feature = "cpal")]
        let driver = match audio.as_mut() {
            Some(audio) => BlockDriver::spawn(engine, audio.start()?)?,
            None => BlockDriver::spawn(engine, |_| {})?,
        };
        #[cfg(not(feature = "cpal"))]
        let driver = BlockDriver::spawn(engine, |_| {})?;
        Runner::Driver(driver)
    };

    println!("=== saavy-sampler ===  (type 'help')");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;

        let action = match parse_line(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match action {
            ConsoleAction::Send(command) => client.post(&command)?,
            ConsoleAction::Save(path) => {
                *pending_save.lock() = Some(path);
                client.post(&ClientCommand::RequestPatch)?;
            }
            ConsoleAction::Load(path) => match fs::read_to_string(&path) {
                Ok(document) => client.post(&ClientCommand::LoadPatch { document })?,
                Err(err) => {
                    println!("could not read {}: {err}", path.display());
                    continue;
                }
            },
            ConsoleAction::Json => client.post(&ClientCommand::RequestPatch)?,
            ConsoleAction::Render(blocks) => match &mut runner {
                Runner::Manual(engine, block) => {
                    let mut peak = 0.0f32;
                    for _ in 0..blocks {
                        engine.run_block(block);
                        peak = peak.max(block.peak());
                    }
                    println!("rendered {blocks} blocks, peak {peak:.3}");
                }
                Runner::Driver(_) => println!("the driver is rendering already"),
            },
            ConsoleAction::Help => {
                println!("{HELP}");
                continue;
            }
            ConsoleAction::Quit => break,
        }

        runner.settle();
        client.pump();
    }

    client.post(&ClientCommand::Shutdown)?;
    runner.settle();
    client.pump();
    let engine = runner.finish()?;
    tracing::info!(blocks = engine.blocks_rendered(), "bye");
    Ok(())
}
