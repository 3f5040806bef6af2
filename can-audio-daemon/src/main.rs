//! CAN Audio Daemon
//!
//! Listens to the vehicle bus and drives warning tones, DSP volume/mute and
//! host shutdown through the can-audio-reactor library. Adds:
//! - TOML configuration and CLI
//! - SocketCAN transport with interface bring-up
//! - miniDSP HTTP client and daemon process
//! - flac | aplay playback
//! - systemd power-off

use anyhow::{Context, Result};
use can_audio_reactor::{reactor, update_queue, RunOutcome, SignalDatabase, SignalReactor};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

mod audio;
mod bus;
mod config;
mod dsp;
mod script;
mod shutdown;

use audio::ProcessPipeline;
use bus::BusListener;
use config::{AppConfig, LoggingConfig};
use dsp::{DspDaemon, MiniDspClient};
use shutdown::SystemShutdown;

const EXIT_CONFIG: u8 = 1;
const EXIT_LISTEN_LOOP: u8 = 10;
const EXIT_BUS: u8 = 100;

const LOG_FILE_NAME: &str = "can-audio.log";

/// CAN Audio Daemon - warning tones and DSP volume control from CAN signals
#[derive(Parser, Debug)]
#[command(name = "can-audio-daemon")]
#[command(about = "React to CAN signals with warning tones and DSP volume control", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Play a fixed command script instead of listening to the bus
    #[arg(long)]
    test: bool,

    /// Seconds between scripted commands in test mode
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    test_pause: u64,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(e) = init_logging(args.verbose, args.quiet, &config.logging) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    log::info!("CAN Audio Daemon v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using reactor library v{}", can_audio_reactor::VERSION);

    // The bus is only needed when not running the script
    let listener = if args.test {
        None
    } else {
        match open_bus(&config) {
            Ok(listener) => Some(listener),
            Err(e) => {
                log::error!("{:#}", e);
                return ExitCode::from(EXIT_BUS);
            }
        }
    };

    match run_daemon(&args, &config, listener) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

/// Load the DBC and bring the interface up
fn open_bus(config: &AppConfig) -> Result<BusListener> {
    let general = &config.general;

    log::info!("Loading DBC: {:?}", general.dbc_file);
    let database = SignalDatabase::from_dbc_file(&general.dbc_file)
        .with_context(|| format!("Failed to load DBC file {:?}", general.dbc_file))?;
    log::info!(
        "Loaded {} messages with {} signals",
        database.num_messages(),
        database.num_signals()
    );

    bus::bring_up(&general.can_device, general.can_bitrate);
    let listener = BusListener::open(&general.can_device, config.recv_timeout(), database)?;
    Ok(listener)
}

fn run_daemon(args: &Args, config: &AppConfig, listener: Option<BusListener>) -> Result<ExitCode> {
    // Held until the daemon exits; dropping it kills the process
    let _dsp_daemon = match &config.minidsp.bin_path {
        Some(bin_path) => Some(DspDaemon::spawn(bin_path, config.minidsp.config_path.as_deref())?),
        None => None,
    };

    let dsp = MiniDspClient::new(
        config.dsp_url(),
        Duration::from_millis(config.minidsp.request_timeout_ms),
        config.minidsp.test_mode,
    )?;
    let pipeline = ProcessPipeline::new(&config.sounds.flac_path, &config.sounds.aplay_path);

    let mut signal_reactor =
        SignalReactor::new(config.reactor_config(), dsp, pipeline, SystemShutdown)
            .context("Invalid reactor configuration")?;
    signal_reactor.prime();

    let (tx, rx) = update_queue();
    let idle_poll = config.idle_poll();
    let reactor_thread = std::thread::Builder::new()
        .name("reactor".to_string())
        .spawn(move || reactor::run(&rx, &mut signal_reactor, idle_poll))
        .context("Failed to spawn reactor thread")?;

    let code = match listener {
        None => {
            script::play(&tx, Duration::from_secs(args.test_pause));
            log::info!("Test script complete");
            ExitCode::SUCCESS
        }
        Some(listener) => {
            log::info!("Listening on {}", config.general.can_device);
            if let Err(e) = listener.listen(&tx) {
                log::error!("{:#}", e);
            }
            log::error!("Listen loop unexpectedly exited");
            bus::bring_down(&config.general.can_device);
            ExitCode::from(EXIT_LISTEN_LOOP)
        }
    };

    drop(tx);
    match reactor_thread.join() {
        Ok(RunOutcome::Shutdown) => log::info!("Reactor stopped after shutdown"),
        Ok(RunOutcome::SourceClosed) => log::debug!("Reactor drained the queue"),
        Err(_) => log::error!("Reactor thread panicked"),
    }

    Ok(code)
}

/// Initialize logging
fn init_logging(verbose: u8, quiet: bool, logging: &LoggingConfig) -> Result<()> {
    use env_logger::{Builder, Target};
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => match &logging.log_level {
                Some(name) => name
                    .parse()
                    .with_context(|| format!("Unknown log level: {}", name))?,
                None => LevelFilter::Info,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} [{} {}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_dir) = &logging.log_dir {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
        let path = log_dir.join(LOG_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {:?}", path))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["can-audio-daemon", "-vv", "--test", "daemon.toml"]);
        assert_eq!(args.config, PathBuf::from("daemon.toml"));
        assert!(args.test);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.test_pause, 5);
        assert!(!args.quiet);
    }

    #[test]
    fn test_config_path_required() {
        assert!(Args::try_parse_from(["can-audio-daemon"]).is_err());
    }
}
