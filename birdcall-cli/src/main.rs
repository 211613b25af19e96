//! `birdcall` command-line host.
//!
//! Lists input devices, remembers the chosen one, and runs a single mimic
//! round: wait for the player, record, score against a reference call.

mod settings;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use birdcall_core::{
    audio::dump::write_recording, grade, list_input_devices, MimicEngine, Phase,
};
use settings::{default_settings_path, devices_path, load_settings, save_settings, write_json};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEVICE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

const USAGE: &str = "Usage:
  birdcall devices
  birdcall use <id>
  birdcall mimic <reference.wav> [--device <id>] [--max-delay <secs>]
                 [--threshold <x>] [--attempt <n>] [--dump <file.wav>] [--retry-device]";

#[derive(Debug)]
struct MimicArgs {
    reference: PathBuf,
    device: Option<usize>,
    max_delay_secs: Option<f32>,
    threshold: Option<f32>,
    attempt: u32,
    dump: Option<PathBuf>,
    retry_device: bool,
}

#[derive(Debug)]
enum Command {
    Devices,
    Use(usize),
    Mimic(MimicArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("birdcall=info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("birdcall: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1))? {
        Command::Devices => devices(),
        Command::Use(id) => use_device(id),
        Command::Mimic(args) => mimic(args),
    }
}

fn parse_args(mut it: impl Iterator<Item = String>) -> anyhow::Result<Command> {
    let Some(command) = it.next() else {
        bail!("missing command\n{USAGE}");
    };

    match command.as_str() {
        "devices" => Ok(Command::Devices),
        "use" => {
            let Some(v) = it.next() else {
                bail!("missing device id\n{USAGE}");
            };
            let id = v.parse().with_context(|| format!("invalid device id: {v}"))?;
            Ok(Command::Use(id))
        }
        "mimic" => {
            let mut reference: Option<PathBuf> = None;
            let mut args = MimicArgs {
                reference: PathBuf::new(),
                device: None,
                max_delay_secs: None,
                threshold: None,
                attempt: 1,
                dump: None,
                retry_device: false,
            };
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--device" => args.device = Some(parse_value(&mut it, "--device")?),
                    // 0 means no deadline
                    "--max-delay" => {
                        args.max_delay_secs = Some(parse_value::<f32>(&mut it, "--max-delay")?)
                            .filter(|secs| *secs > 0.0)
                    }
                    "--threshold" => args.threshold = Some(parse_value(&mut it, "--threshold")?),
                    "--attempt" => {
                        args.attempt = parse_value::<u32>(&mut it, "--attempt")?.max(1)
                    }
                    "--dump" => {
                        let Some(v) = it.next() else {
                            bail!("missing value for --dump");
                        };
                        args.dump = Some(PathBuf::from(v));
                    }
                    "--retry-device" => args.retry_device = true,
                    other if other.starts_with("--") => bail!("unknown argument: {other}"),
                    path if reference.is_none() => reference = Some(PathBuf::from(path)),
                    other => bail!("unexpected argument: {other}"),
                }
            }
            let Some(reference) = reference else {
                bail!("missing reference file\n{USAGE}");
            };
            args.reference = reference;
            Ok(Command::Mimic(args))
        }
        "--help" | "-h" | "help" => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        other => bail!("unknown command: {other}\n{USAGE}"),
    }
}

fn parse_value<T: std::str::FromStr>(
    it: &mut impl Iterator<Item = String>,
    flag: &str,
) -> anyhow::Result<T> {
    let Some(v) = it.next() else {
        bail!("missing value for {flag}");
    };
    v.parse::<T>()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {v}"))
}

fn devices() -> anyhow::Result<()> {
    let devices = list_input_devices();
    if devices.is_empty() {
        println!("no input devices found");
    }
    for device in &devices {
        println!("{device}");
    }

    let path = devices_path();
    write_json(&path, &devices)
        .with_context(|| format!("writing device list to {}", path.display()))?;
    info!(path = %path.display(), count = devices.len(), "device list saved");
    Ok(())
}

fn use_device(id: usize) -> anyhow::Result<()> {
    let devices = list_input_devices();
    match devices.iter().find(|d| d.id == id) {
        Some(device) => println!("using {device}"),
        None => bail!("no input device with id {id}; run `birdcall devices`"),
    }

    let path = default_settings_path();
    let mut settings = load_settings(&path);
    settings.input_device = Some(id);
    save_settings(&path, &settings)
        .with_context(|| format!("saving settings to {}", path.display()))?;
    Ok(())
}

fn mimic(args: MimicArgs) -> anyhow::Result<()> {
    let settings = load_settings(&default_settings_path());
    let threshold = args.threshold.unwrap_or(settings.threshold);
    let device = args.device.or(settings.input_device);

    let mut engine = MimicEngine::new(settings.engine.clone());
    let reference = engine
        .load_reference(&args.reference)
        .context("loading reference call")?;

    loop {
        match engine.open(device) {
            Ok(()) => break,
            Err(e) if args.retry_device && e.is_device_error() => {
                warn!("input device unavailable, retrying: {e}");
                thread::sleep(DEVICE_RETRY_INTERVAL);
            }
            Err(e) => return Err(e).context("opening input device"),
        }
    }

    let target = engine.target_samples(reference.duration_secs);
    let max_delay = args.max_delay_secs.map(|secs| engine.secs_to_samples(secs));

    engine.start();
    println!("listening... ({:.1} s call)", reference.duration_secs);

    let mut last = Phase::Waiting;
    let phase = loop {
        let (phase, _) = engine.poll(target, max_delay);
        if phase != last {
            println!("{}", phase.label());
            last = phase;
        }
        if phase.is_terminal() {
            break phase;
        }
        if let Some(e) = engine.stream_error() {
            bail!("input stream failed: {e}");
        }
        thread::sleep(POLL_INTERVAL);
    };
    engine.close();

    if phase == Phase::Timeout {
        println!("no call heard");
        return Ok(());
    }

    if let Some(path) = args.dump.as_ref() {
        write_recording(path, engine.recording(), engine.sample_rate())
            .with_context(|| format!("dumping recording to {}", path.display()))?;
    }

    let answer = engine.transform(engine.recording());
    let score = engine.compare(&answer, &reference.spectrogram);
    let verdict = grade(score, threshold, args.attempt);
    println!(
        "{}% (goal = {}%): {}",
        verdict.score_percent(),
        verdict.threshold_percent(),
        verdict.feedback.label()
    );
    Ok(())
}
