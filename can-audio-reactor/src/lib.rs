//! CAN Audio Reactor Library
//!
//! Reacts to decoded vehicle-bus signals (power state, head-unit volume and
//! mute, reverse gear, parking-proximity distance, cross-traffic alerts) and
//! drives two outputs: short warning tones over dedicated notification
//! channels, and volume/mute control of the main audio path on a DSP. It also
//! shuts the host down once the vehicle has been powered off for a sustained
//! period.
//!
//! # Architecture
//!
//! - [`SignalReactor`] owns all state and applies the dispatch rules
//! - [`PlaybackArbiter`] keeps at most one playback session per category
//! - [`VolumeTranslator`] maps head-unit levels onto DSP attenuation
//! - [`PowerController`] debounces power-off and fires the shutdown effect
//! - [`update_queue`] is the FIFO between the update source and the reactor
//!
//! The library does NOT speak to hardware. The DSP daemon, the audio
//! pipeline and the host shutdown are reached through the [`DspSink`],
//! [`PlaybackPipeline`] and [`ShutdownEffect`] traits; the daemon binary
//! provides the real implementations.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_audio_reactor::{
//!     reactor, update_queue, DspBatch, DspSink, InputPair, PlaybackPipeline, ReactorConfig,
//!     ShutdownEffect, SignalReactor, SignalUpdate,
//! };
//! use std::path::Path;
//! use std::time::Duration;
//!
//! struct Dsp;
//! impl DspSink for Dsp {
//!     fn submit(&mut self, _batch: &DspBatch) -> can_audio_reactor::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct Player;
//! impl PlaybackPipeline for Player {
//!     type Handle = ();
//!     fn start(&mut self, _resource: &Path) -> can_audio_reactor::Result<()> {
//!         Ok(())
//!     }
//!     fn stop(&mut self, _handle: ()) {}
//! }
//!
//! struct PowerOff;
//! impl ShutdownEffect for PowerOff {
//!     fn shutdown(&mut self) {}
//! }
//!
//! let config = ReactorConfig::new(30, 120, InputPair::new(1, 2), InputPair::new(3, 4));
//! let mut signal_reactor = SignalReactor::new(config, Dsp, Player, PowerOff).unwrap();
//! signal_reactor.prime();
//!
//! let (tx, rx) = update_queue();
//! std::thread::spawn(move || {
//!     tx.send(SignalUpdate::new().with("HU_VolumeStatus", 20));
//! });
//!
//! reactor::run(&rx, &mut signal_reactor, Duration::from_millis(50));
//! ```

// Public modules
pub mod config;
pub mod decode;
pub mod playback;
pub mod power;
pub mod queue;
pub mod reactor;
pub mod signals;
pub mod types;
pub mod volume;

// Re-export main types for convenience
pub use config::{InputPair, ReactorConfig, SoundConfig};
pub use decode::SignalDatabase;
pub use playback::{PlaybackArbiter, PlaybackPipeline};
pub use power::{PowerController, ShutdownEffect};
pub use queue::{update_queue, QueueEvent, UpdateReceiver, UpdateSender};
pub use reactor::{Flow, ReactorState, RunOutcome, SignalReactor};
pub use types::{Category, Channel, ReactorError, Result, SignalUpdate, Timestamp, VehiclePower};
pub use volume::{to_attenuation, DspBatch, DspCommand, DspSink, VolumeTranslator, MIN_ATTENUATION};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
