// Maccel CLI
// System-wide macOS key remapper driven by a TOML configuration

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, select, Receiver};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use maccel_core::hid;
use maccel_core::modifier;
use maccel_core::input::key_action;
use maccel_core::sim::{SimulatedBackend, StaticInputSources};
use maccel_core::tap::DisableReason;
use maccel_core::{
    named_keys, Config, EngineContext, EngineNotice, InjectionFailure, KeyCode, KeySynthesizer,
    RawKeyEvent, Strategy, SyntheticKey,
};

/// Input sources assumed by --simulate
const SIMULATED_INPUT_SOURCES: usize = 4;

/// System-wide macOS key remapper
#[derive(Parser, Debug)]
#[command(name = "maccel")]
#[command(version)]
#[command(about = "System-wide macOS key remapper", long_about = None)]
struct Args {
    /// TOML configuration file (default: ~/.config/maccel/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List key names accepted in the config
    #[arg(long)]
    list_keys: bool,

    /// Install the remaps as a keyboard driver mapping and exit
    #[arg(long, conflicts_with = "clear_hid")]
    hid: bool,

    /// Remove any keyboard driver mapping and exit
    #[arg(long)]
    clear_hid: bool,

    /// Read key events from stdin ("down capslock", "up capslock", "disable")
    /// and print what applications would receive
    #[arg(long)]
    simulate: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => {
                log::warn!("No configuration file found, running without remaps");
                return Ok(Config::default());
            }
        },
    };
    log::info!("Loading {}", path.display());
    Config::from_toml_path(&path).with_context(|| format!("Failed to load {}", path.display()))
}

fn list_keys() {
    for (key, names) in named_keys() {
        println!("0x{:02x}  {}", key.code(), names.join(", "));
    }
}

#[cfg(target_os = "macos")]
fn run(config: &Config) -> Result<()> {
    use maccel_core::platform::macos::{QuartzSynthesizer, QuartzTapBackend, TisInputSources};

    let mut engine = EngineContext::new(config.engine.clone());
    engine.publish(config.to_table());
    engine
        .start(
            &mut QuartzTapBackend::new(),
            Box::new(QuartzSynthesizer::new()),
            Box::new(TisInputSources::new()),
        )
        .context("Failed to start event tap")?;
    log::info!("Remapping active, press Ctrl-C to stop");

    wait_for_shutdown(engine.notices())?;
    engine.shutdown();
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run(_config: &Config) -> Result<()> {
    bail!("event taps are only available on macOS; use --simulate to try a configuration")
}

/// Block until SIGINT/SIGTERM, logging engine notices meanwhile
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn wait_for_shutdown(notices: Receiver<EngineNotice>) -> Result<()> {
    let (signal_tx, signal_rx) = bounded(1);
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handler")?;
    let handle = signals.handle();
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            let _ = signal_tx.send(signal);
        }
    });

    loop {
        select! {
            recv(signal_rx) -> _ => {
                log::info!("Received signal, shutting down");
                break;
            }
            recv(notices) -> notice => match notice {
                Ok(EngineNotice::ReenableExhausted { attempts }) => log::error!(
                    "Keyboard remapping stopped: the system refused {} re-enable attempts",
                    attempts
                ),
                Ok(notice) => log::debug!("{:?}", notice),
                Err(_) => break,
            },
        }
    }
    handle.close();
    Ok(())
}

/// Synthesizer for --simulate: prints instead of posting
struct EchoSynthesizer;

impl KeySynthesizer for EchoSynthesizer {
    fn post(&self, key: SyntheticKey) -> Result<(), InjectionFailure> {
        if key.key.to_native().is_none() {
            return Err(InjectionFailure::KeyOutOfRange(key.key));
        }
        println!("  posted {}", key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimCommand {
    Down(KeyCode),
    Repeat(KeyCode),
    Up(KeyCode),
    Disable,
}

fn parse_sim_line(line: &str) -> Result<SimCommand> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    if verb == "disable" {
        return Ok(SimCommand::Disable);
    }
    let Some(key) = words.next() else {
        bail!("expected \"<down|up|repeat> <key>\", got {:?}", line);
    };
    let key: KeyCode = key.parse().map_err(anyhow::Error::msg)?;
    match verb {
        "down" => Ok(SimCommand::Down(key)),
        "repeat" => Ok(SimCommand::Repeat(key)),
        "up" => Ok(SimCommand::Up(key)),
        other => bail!("unknown command {:?}", other),
    }
}

/// Native event for a simulated transition, tracking held modifier flags
fn sim_event(command: SimCommand, held: &mut u64) -> Option<RawKeyEvent> {
    let (key, down, repeat) = match command {
        SimCommand::Down(key) => (key, true, false),
        SimCommand::Repeat(key) => (key, true, true),
        SimCommand::Up(key) => (key, false, false),
        SimCommand::Disable => return None,
    };
    if key.is_modifier() {
        *held = modifier::with_key(*held, key, down);
        return Some(RawKeyEvent::flags_changed(key, *held));
    }
    let event = if down {
        RawKeyEvent::key_down(key)
    } else {
        RawKeyEvent::key_up(key)
    };
    Some(event.with_flags(*held).with_autorepeat(repeat))
}

fn describe(event: &RawKeyEvent) -> String {
    match key_action(event) {
        Some(action) => format!("{}{}", event.key_code, action.arrow()),
        None => format!("{:?}", event),
    }
}

fn simulate(config: &Config) -> Result<()> {
    let mut engine_config = config.engine.clone();
    engine_config.tap.watchdog_interval = None;

    let mut engine = EngineContext::new(engine_config);
    engine.publish(config.to_table());
    let mut backend = SimulatedBackend::new();
    engine.start(
        &mut backend,
        Box::new(EchoSynthesizer),
        Box::new(StaticInputSources::new(SIMULATED_INPUT_SOURCES)),
    )?;

    let started = Instant::now();
    let mut held = 0;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command = match parse_sim_line(line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        let Some(event) = sim_event(command, &mut held) else {
            backend.disable(DisableReason::UserInput);
            println!("tap disabled -> {}", engine.state());
            continue;
        };
        let event = event.with_timestamp(started.elapsed().as_nanos() as u64);
        match backend.forward(event) {
            Some(delivered) => println!("{} -> {}", describe(&event), describe(&delivered)),
            None => println!("{} -> (suppressed)", describe(&event)),
        }
    }

    engine.shutdown();
    Ok(())
}

/// Settings the HID mapping cannot honour; it only covers `[remap]`
fn tap_only_settings(config: &Config) -> Vec<String> {
    let mut ignored = Vec::new();
    if !config.suppressed.is_empty() {
        ignored.push(format!(
            "{} suppressed keys (suppression needs the event tap strategy)",
            config.suppressed.len()
        ));
    }
    if !config.input_sources.is_empty() {
        ignored.push(format!(
            "{} input source bindings (short-press switching needs the event tap strategy)",
            config.input_sources.len()
        ));
    }
    ignored
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_keys {
        list_keys();
        return Ok(());
    }
    if args.clear_hid {
        return hid::clear().context("Failed to clear HID key mapping");
    }

    let config = load_config(args.config.as_deref())?;

    if args.check_config {
        println!(
            "Configuration is valid: {} remaps, {} suppressed keys, {} input source bindings",
            config.remaps.len(),
            config.suppressed.len(),
            config.input_sources.len()
        );
        return Ok(());
    }
    if args.simulate {
        return simulate(&config);
    }
    if args.hid || config.strategy == Strategy::Hid {
        for ignored in tap_only_settings(&config) {
            log::warn!("HID mapping ignores {}", ignored);
        }
        return hid::apply(config.remapping_pairs()).context("Failed to install HID key mapping");
    }
    run(&config)
}
