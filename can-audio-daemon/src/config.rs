//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_audio_reactor::{InputPair, ReactorConfig, SoundConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from the TOML file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub minidsp: MiniDspConfig,
    #[serde(default)]
    pub sounds: SoundsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// DBC file describing the bus
    pub dbc_file: PathBuf,
    /// SocketCAN interface name
    pub can_device: String,
    pub can_bitrate: u32,
    pub max_vol: i64,
    /// Seconds of sustained power-off before shutdown
    pub veh_off_wait: u64,
    /// Bus receive timeout before an idle marker is queued
    #[serde(default = "default_recv_timeout_secs")]
    pub recv_timeout_secs: u64,
    /// How long the reactor waits on an empty queue before its own grace check
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

fn default_recv_timeout_secs() -> u64 {
    10
}

fn default_idle_poll_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiniDspConfig {
    pub main_left: u8,
    pub main_right: u8,
    pub notify_left: u8,
    pub notify_right: u8,
    /// Level applied to the notification inputs at start-up
    pub notify_level: i64,
    /// Level applied to the main inputs while reversing
    pub notify_attenuate: i64,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub device: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// DSP daemon binary, spawned at start-up when set
    pub bin_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    /// Log DSP payloads instead of sending them
    #[serde(default)]
    pub test_mode: bool,
}

fn default_http_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    5380
}

fn default_request_timeout_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoundsConfig {
    #[serde(default)]
    pub directory: PathBuf,
    #[serde(default = "default_beep")]
    pub beep: String,
    #[serde(default = "default_proximity")]
    pub proximity: String,
    #[serde(default = "default_traffic")]
    pub traffic: String,
    #[serde(default = "default_flac_path")]
    pub flac_path: PathBuf,
    #[serde(default = "default_aplay_path")]
    pub aplay_path: PathBuf,
}

fn default_beep() -> String {
    SoundConfig::default().beep
}

fn default_proximity() -> String {
    SoundConfig::default().proximity
}

fn default_traffic() -> String {
    SoundConfig::default().traffic
}

fn default_flac_path() -> PathBuf {
    PathBuf::from("/usr/bin/flac")
}

fn default_aplay_path() -> PathBuf {
    PathBuf::from("/usr/bin/aplay")
}

impl Default for SoundsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            beep: default_beep(),
            proximity: default_proximity(),
            traffic: default_traffic(),
            flac_path: default_flac_path(),
            aplay_path: default_aplay_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for the log file; stderr when unset
    pub log_dir: Option<PathBuf>,
    /// error, warn, info, debug or trace
    pub log_level: Option<String>,
}

impl AppConfig {
    /// The reactor's view of this configuration
    pub fn reactor_config(&self) -> ReactorConfig {
        let sounds = SoundConfig {
            directory: self.sounds.directory.clone(),
            beep: self.sounds.beep.clone(),
            proximity: self.sounds.proximity.clone(),
            traffic: self.sounds.traffic.clone(),
            ..SoundConfig::default()
        };
        ReactorConfig::new(
            self.general.max_vol,
            self.general.veh_off_wait,
            InputPair::new(self.minidsp.main_left, self.minidsp.main_right),
            InputPair::new(self.minidsp.notify_left, self.minidsp.notify_right),
        )
        .with_notify_level(self.minidsp.notify_level)
        .with_reverse_level(self.minidsp.notify_attenuate)
        .with_sounds(sounds)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.general.recv_timeout_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.general.idle_poll_ms)
    }

    /// Base URL of the DSP device endpoint
    pub fn dsp_url(&self) -> String {
        format!(
            "http://{}:{}/devices/{}",
            self.minidsp.http_addr, self.minidsp.http_port, self.minidsp.device
        )
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("Failed to parse config")?;

    config.reactor_config().validate()?;
    if config.general.recv_timeout_secs == 0 {
        anyhow::bail!("recv_timeout_secs must be at least 1 second");
    }
    if config.general.can_device.is_empty() {
        anyhow::bail!("can_device must not be empty");
    }

    Ok(config)
}
