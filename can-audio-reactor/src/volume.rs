//! Volume/mute translation
//!
//! Maps head-unit volume levels onto DSP attenuation values and turns the
//! reactor's volume and mute decisions into batched DSP commands.

use crate::config::InputPair;
use crate::types::{Channel, Result};

/// Attenuation representing silence
pub const MIN_ATTENUATION: f64 = -127.0;
/// Attenuation representing full scale
pub const MAX_ATTENUATION: f64 = 0.0;

/// Map a head-unit level linearly onto `[MIN_ATTENUATION, 0]`
///
/// `level` is clamped to `0..=max_level`, so `0` yields [`MIN_ATTENUATION`]
/// and `max_level` yields `0`. A non-positive `max_level` is rejected by
/// configuration validation; if one slips through the result is silence.
pub fn to_attenuation(level: i64, max_level: i64) -> f64 {
    if max_level <= 0 {
        return MIN_ATTENUATION;
    }
    let level = level.clamp(0, max_level);
    let fraction = level as f64 / max_level as f64;
    MIN_ATTENUATION + MIN_ATTENUATION.abs() * fraction
}

/// A single intent understood by the DSP daemon
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DspCommand {
    SetMasterVolume(f64),
    SetInputVolume { input: u8, level: f64 },
    SetMasterMute(bool),
    SetInputMute { input: u8, muted: bool },
}

/// Commands flushed to the DSP together as one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DspBatch {
    commands: Vec<DspCommand>,
}

impl DspBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DspCommand) {
        self.commands.push(command);
    }

    pub fn master_volume(mut self, level: f64) -> Self {
        self.push(DspCommand::SetMasterVolume(level));
        self
    }

    pub fn master_mute(mut self, muted: bool) -> Self {
        self.push(DspCommand::SetMasterMute(muted));
        self
    }

    pub fn input_volume(mut self, inputs: &[u8], level: f64) -> Self {
        for &input in inputs {
            self.push(DspCommand::SetInputVolume { input, level });
        }
        self
    }

    pub fn input_mute(mut self, inputs: &[u8], muted: bool) -> Self {
        for &input in inputs {
            self.push(DspCommand::SetInputMute { input, muted });
        }
        self
    }

    pub fn commands(&self) -> &[DspCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Transport to the external DSP daemon
pub trait DspSink {
    /// Apply every command in the batch as one request
    fn submit(&mut self, batch: &DspBatch) -> Result<()>;
}

impl<T: DspSink + ?Sized> DspSink for Box<T> {
    fn submit(&mut self, batch: &DspBatch) -> Result<()> {
        (**self).submit(batch)
    }
}

/// Issues volume and mute intents for the main and notification paths
///
/// Transport failures are logged and swallowed: the caller keeps believing
/// the requested value is in effect and the next change re-sends the full
/// desired value.
pub struct VolumeTranslator<D: DspSink> {
    sink: D,
    max_vol: i64,
    main_inputs: InputPair,
    notify_inputs: InputPair,
}

impl<D: DspSink> VolumeTranslator<D> {
    pub fn new(sink: D, max_vol: i64, main_inputs: InputPair, notify_inputs: InputPair) -> Self {
        Self {
            sink,
            max_vol,
            main_inputs,
            notify_inputs,
        }
    }

    /// Attenuation for a head-unit level on this translator's scale
    pub fn attenuation(&self, level: i64) -> f64 {
        to_attenuation(level, self.max_vol)
    }

    /// Set the main path to the curve value of `level`
    pub fn set_main_volume(&mut self, level: i64) {
        let batch = DspBatch::new().input_volume(&self.main_inputs.both(), self.attenuation(level));
        self.apply(batch);
    }

    /// Mute the main path and drop it to the curve minimum, or restore
    /// `level` and unmute
    pub fn set_main_mute(&mut self, muted: bool, level: i64) {
        let inputs = self.main_inputs.both();
        let batch = if muted {
            DspBatch::new()
                .input_mute(&inputs, true)
                .input_volume(&inputs, MIN_ATTENUATION)
        } else {
            DspBatch::new()
                .input_volume(&inputs, self.attenuation(level))
                .input_mute(&inputs, false)
        };
        self.apply(batch);
    }

    /// Set both notification inputs to the curve value of `level`
    pub fn set_notify_volume(&mut self, level: i64) {
        let batch =
            DspBatch::new().input_volume(&self.notify_inputs.both(), self.attenuation(level));
        self.apply(batch);
    }

    /// Mute or unmute the notification input(s) a channel addresses
    pub fn set_notify_mute(&mut self, channel: Channel, muted: bool) {
        let batch = DspBatch::new().input_mute(&self.notify_inputs.for_channel(channel), muted);
        self.apply(batch);
    }

    /// Send a batch, logging instead of propagating transport failures
    pub fn apply(&mut self, batch: DspBatch) {
        if batch.is_empty() {
            return;
        }
        log::trace!("Submitting DSP batch: {:?}", batch.commands());
        if let Err(e) = self.sink.submit(&batch) {
            log::warn!("Couldn't apply DSP commands {:?}: {}", batch.commands(), e);
        }
    }
}
