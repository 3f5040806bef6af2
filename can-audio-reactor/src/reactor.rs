//! Signal reactor
//!
//! The stateful dispatcher at the centre of the system. It consumes decoded
//! signal updates one at a time and decides when warning tones start and
//! stop, what the main audio path's volume and mute should be, and when the
//! host shuts down.
//!
//! Rules are evaluated in a fixed order for every update:
//! power → grace check → proximity → traffic → beep → reverse → volume → mute.
//! An update may match several rules; no rule depends on the outcome of a
//! later one in the same pass.

use crate::config::ReactorConfig;
use crate::playback::{PlaybackArbiter, PlaybackPipeline};
use crate::power::{PowerController, ShutdownEffect};
use crate::queue::{QueueEvent, UpdateReceiver};
use crate::signals::{self, Sensor, TrafficSignal};
use crate::types::{Category, Channel, Result, SignalUpdate, Timestamp, VehiclePower};
use crate::volume::{DspSink, VolumeTranslator};
use chrono::Utc;
use std::time::Duration;

/// State owned exclusively by the reactor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactorState {
    /// Last applied head-unit volume level
    pub volume: i64,
    /// Last applied mute flag
    pub mute: bool,
    pub vehicle_power: VehiclePower,
    pub reverse: bool,
    /// Volume captured when reverse was entered
    pub pre_reverse_volume: Option<i64>,
    /// Set iff `vehicle_power` is `Off`
    pub power_off_since: Option<Timestamp>,
    /// Highest active distance level per channel, indexed by [`Channel::index`]
    pub proximity_level: [i64; 3],
    /// Last raw level per sensor, indexed by [`Sensor::index`]
    pub proximity_raw: [i64; 6],
    /// Cross-traffic alert flag for left and right
    pub traffic_active: [bool; 2],
}

impl ReactorState {
    pub fn proximity_level(&self, channel: Channel) -> i64 {
        self.proximity_level[channel.index()]
    }

    pub fn proximity_raw(&self, sensor: Sensor) -> i64 {
        self.proximity_raw[sensor.index()]
    }

    pub fn traffic_active(&self, channel: Channel) -> bool {
        match channel {
            Channel::Left => self.traffic_active[0],
            Channel::Right => self.traffic_active[1],
            Channel::Center => false,
        }
    }

    /// Highest proximity level across every channel
    pub fn max_proximity_level(&self) -> i64 {
        self.proximity_level.iter().copied().max().unwrap_or(0)
    }

    fn set_traffic_active(&mut self, channel: Channel, active: bool) {
        match channel {
            Channel::Left => self.traffic_active[0] = active,
            Channel::Right => self.traffic_active[1] = active,
            Channel::Center => {}
        }
    }

    fn recompute_proximity_level(&mut self, channel: Channel) -> i64 {
        let level = Sensor::ALL
            .iter()
            .filter(|s| s.channel() == channel)
            .map(|s| self.proximity_raw[s.index()])
            .max()
            .unwrap_or(0);
        self.proximity_level[channel.index()] = level;
        level
    }
}

/// What the caller should do after an update has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The shutdown effect has fired; nothing further matters
    Shutdown,
}

/// Why the reactor loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    SourceClosed,
}

/// The signal reactor, generic over its three external collaborators
pub struct SignalReactor<D: DspSink, P: PlaybackPipeline, S: ShutdownEffect> {
    config: ReactorConfig,
    state: ReactorState,
    volume: VolumeTranslator<D>,
    playback: PlaybackArbiter<P>,
    power: PowerController<S>,
}

impl<D: DspSink, P: PlaybackPipeline, S: ShutdownEffect> SignalReactor<D, P, S> {
    /// Create a reactor from a validated configuration
    pub fn new(config: ReactorConfig, dsp: D, pipeline: P, shutdown: S) -> Result<Self> {
        config.validate()?;
        let volume = VolumeTranslator::new(dsp, config.max_vol, config.main_inputs, config.notify_inputs);
        let playback = PlaybackArbiter::new(pipeline, config.sounds.clone());
        let power = PowerController::new(shutdown, config.veh_off_wait);
        Ok(Self {
            config,
            state: ReactorState::default(),
            volume,
            playback,
            power,
        })
    }

    /// Put the notification inputs at their configured level, muted
    pub fn prime(&mut self) {
        log::debug!(
            "Priming notification inputs at level {} (muted)",
            self.config.notify_level
        );
        self.volume.set_notify_volume(self.config.notify_level);
        self.volume.set_notify_mute(Channel::Center, true);
    }

    pub fn state(&self) -> &ReactorState {
        &self.state
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    pub fn playback(&self) -> &PlaybackArbiter<P> {
        &self.playback
    }

    /// Process one queue event
    pub fn process(&mut self, event: &QueueEvent, now: Timestamp) -> Flow {
        match event {
            QueueEvent::Update(update) => self.process_update(update, now),
            QueueEvent::Idle => self.check_grace(now),
        }
    }

    /// Consume one decoded update
    pub fn process_update(&mut self, update: &SignalUpdate, now: Timestamp) -> Flow {
        if !self.is_relevant(update) {
            log::trace!("Update carries no known signals: {:?}", update);
        }

        self.apply_power(update, now);
        if self.check_grace(now) == Flow::Shutdown {
            return Flow::Shutdown;
        }
        self.apply_proximity(update);
        self.apply_traffic(update);
        self.apply_beep(update);
        self.apply_reverse(update);
        self.apply_volume(update);
        self.apply_mute(update);
        Flow::Continue
    }

    /// Evaluate the power-off grace period
    pub fn check_grace(&mut self, now: Timestamp) -> Flow {
        if self
            .power
            .maybe_shutdown(self.state.vehicle_power, self.state.power_off_since, now)
        {
            Flow::Shutdown
        } else {
            Flow::Continue
        }
    }

    fn is_relevant(&self, update: &SignalUpdate) -> bool {
        [
            signals::NO_OP,
            signals::HU_VEHICLE_POWER,
            signals::HU_VOLUME_STATUS,
            signals::HU_MUTE_STATUS,
            signals::REVERSE,
            signals::BEEP,
        ]
        .iter()
        .any(|name| update.contains(name))
            || Sensor::ALL.iter().any(|s| update.contains(s.signal_name()))
            || TrafficSignal::ALL.iter().any(|t| update.contains(t.signal_name()))
    }

    fn apply_power(&mut self, update: &SignalUpdate, now: Timestamp) {
        let Some(raw) = update.get(signals::HU_VEHICLE_POWER) else {
            return;
        };
        let power = VehiclePower::from_raw(raw);
        let previous = self.state.vehicle_power;

        if power == VehiclePower::Off && previous != VehiclePower::Off {
            log::info!(
                "Vehicle power off detected. Waiting for {} seconds to see if vehicle is started up again, otherwise powering off",
                self.config.veh_off_wait
            );
            self.state.power_off_since = Some(now);
        } else if power != VehiclePower::Off && previous == VehiclePower::Off {
            log::info!("Vehicle power off cancelled");
            self.state.power_off_since = None;
        }
        self.state.vehicle_power = power;
    }

    fn apply_proximity(&mut self, update: &SignalUpdate) {
        let mut changed = false;

        for sensor in Sensor::ALL {
            let Some(value) = update.get(sensor.signal_name()) else {
                continue;
            };
            let previous = self.state.proximity_raw(sensor);
            if previous == value {
                continue;
            }
            log::debug!(
                "Proximity alarm `{}` changed from {} to {}",
                sensor.signal_name(),
                previous,
                value
            );
            changed = true;

            let previous_max = self.state.max_proximity_level();
            self.state.proximity_raw[sensor.index()] = value;
            let channel = sensor.channel();
            let level = self.state.recompute_proximity_level(channel);

            if level > previous_max {
                log::info!(
                    "Issuing proximity alert, {} channel, distance level {}",
                    channel,
                    level
                );
                self.playback
                    .start(Category::Proximity, channel, level, &mut self.volume);
            }
            self.suppress_outranked_proximity();
        }

        if changed && self.state.proximity_raw.iter().all(|&raw| raw == 0) {
            log::info!("Rescinding all proximity alerts");
            self.state.proximity_level = [0; 3];
            self.playback
                .stop(Category::Proximity, Channel::Center, &mut self.volume);
        }
    }

    /// Stop the proximity tone once its channel is no longer the most severe
    fn suppress_outranked_proximity(&mut self) {
        let Some(active) = self.playback.active_channel(Category::Proximity) else {
            return;
        };
        let level = self.state.proximity_level(active);
        let max = self.state.max_proximity_level();
        if level < max {
            log::info!(
                "Suppressing proximity alert on {} channel, level {} below {}",
                active,
                level,
                max
            );
            self.playback
                .stop(Category::Proximity, active, &mut self.volume);
        }
    }

    fn apply_traffic(&mut self, update: &SignalUpdate) {
        for signal in TrafficSignal::ALL {
            let Some(value) = update.get(signal.signal_name()) else {
                continue;
            };
            let channel = signal.channel();
            let active = self.state.traffic_active(channel);

            if !active && value != 0 {
                log::info!("Issuing traffic alert for {} channel", channel);
                self.playback
                    .start(Category::Traffic, channel, value, &mut self.volume);
                self.state.set_traffic_active(channel, true);
            } else if active && value == 0 {
                log::info!("Rescinding traffic alert for {} channel", channel);
                self.playback
                    .stop(Category::Traffic, Channel::Center, &mut self.volume);
                self.state.set_traffic_active(channel, false);
            }
        }
    }

    fn apply_beep(&mut self, update: &SignalUpdate) {
        if update.get(signals::BEEP) == Some(signals::BEEP_REQUESTED) {
            log::info!("Playing BEEP tone");
            self.playback
                .start(Category::Beep, Channel::Center, 1, &mut self.volume);
        }
    }

    fn apply_reverse(&mut self, update: &SignalUpdate) {
        let Some(value) = update.get(signals::REVERSE) else {
            return;
        };
        let engaged = value == signals::REVERSE_ENGAGED;

        if engaged && !self.state.reverse {
            log::info!(
                "Vehicle in reverse, setting volume to `{}`",
                self.config.reverse_level
            );
            self.state.pre_reverse_volume = Some(self.state.volume);
            self.volume.set_main_volume(self.config.reverse_level);
            self.state.reverse = true;
        } else if !engaged && self.state.reverse {
            let restore = self
                .state
                .pre_reverse_volume
                .take()
                .unwrap_or(self.state.volume);
            log::info!("Vehicle no longer in reverse, reverting volume to {}", restore);
            self.volume.set_main_volume(restore);
            self.state.volume = restore;
            self.state.reverse = false;
        }
    }

    fn apply_volume(&mut self, update: &SignalUpdate) {
        let Some(level) = update.get(signals::HU_VOLUME_STATUS) else {
            return;
        };
        if level == self.state.volume {
            return;
        }
        log::info!("Volume changed from {} to {}", self.state.volume, level);
        self.volume.set_main_volume(level);
        self.state.volume = level;
    }

    fn apply_mute(&mut self, update: &SignalUpdate) {
        let Some(value) = update.get(signals::HU_MUTE_STATUS) else {
            return;
        };
        let mute = value != signals::MUTE_OFF;
        if mute == self.state.mute {
            return;
        }
        log::info!("Mute changed from {} to {}", self.state.mute, mute);
        self.volume.set_main_mute(mute, self.state.volume);
        self.state.mute = mute;
    }
}

/// Drive the reactor from the queue until shutdown or until the source closes
///
/// `idle_timeout` bounds how long the reactor waits for an event before
/// running the grace check on its own.
pub fn run<D, P, S>(
    receiver: &UpdateReceiver,
    reactor: &mut SignalReactor<D, P, S>,
    idle_timeout: Duration,
) -> RunOutcome
where
    D: DspSink,
    P: PlaybackPipeline,
    S: ShutdownEffect,
{
    while let Some(event) = receiver.next(idle_timeout) {
        if reactor.process(&event, Utc::now()) == Flow::Shutdown {
            return RunOutcome::Shutdown;
        }
    }
    log::warn!("Update source closed, reactor stopping");
    RunOutcome::SourceClosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputPair;
    use crate::volume::DspBatch;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct NullDsp(Rc<RefCell<Vec<DspBatch>>>);

    impl DspSink for NullDsp {
        fn submit(&mut self, batch: &DspBatch) -> Result<()> {
            self.0.borrow_mut().push(batch.clone());
            Ok(())
        }
    }

    struct NullPipeline;

    impl PlaybackPipeline for NullPipeline {
        type Handle = ();

        fn start(&mut self, _resource: &Path) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self, _handle: ()) {}
    }

    #[derive(Clone, Default)]
    struct Shutdowns(Rc<Cell<u32>>);

    impl ShutdownEffect for Shutdowns {
        fn shutdown(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn reactor() -> SignalReactor<NullDsp, NullPipeline, Shutdowns> {
        let config = ReactorConfig::new(30, 60, InputPair::new(1, 2), InputPair::new(3, 4));
        SignalReactor::new(config, NullDsp::default(), NullPipeline, Shutdowns::default()).unwrap()
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let r = reactor();
        let state = r.state();
        assert_eq!(state.vehicle_power, VehiclePower::Unknown);
        assert_eq!(state.volume, 0);
        assert!(!state.mute);
        assert!(state.power_off_since.is_none());
        assert_eq!(state.max_proximity_level(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReactorConfig::new(0, 60, InputPair::new(1, 2), InputPair::new(3, 4));
        let result = SignalReactor::new(config, NullDsp::default(), NullPipeline, Shutdowns::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_power_off_timer_tracks_power() {
        let mut r = reactor();
        r.process_update(&SignalUpdate::new().with(signals::HU_VEHICLE_POWER, 0), at(0));
        assert_eq!(r.state().power_off_since, Some(at(0)));

        // A repeated OFF does not restart the timer
        r.process_update(&SignalUpdate::new().with(signals::HU_VEHICLE_POWER, 0), at(10));
        assert_eq!(r.state().power_off_since, Some(at(0)));

        r.process_update(&SignalUpdate::new().with(signals::HU_VEHICLE_POWER, 2), at(20));
        assert_eq!(r.state().vehicle_power, VehiclePower::On);
        assert!(r.state().power_off_since.is_none());
    }

    #[test]
    fn test_unknown_signals_are_ignored() {
        let mut r = reactor();
        let before = r.state().clone();
        let flow = r.process_update(&SignalUpdate::new().with("EngineSpeed", 800), at(0));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(r.state(), &before);
    }

    #[test]
    fn test_prime_sets_and_mutes_notify_inputs() {
        let dsp = NullDsp::default();
        let config = ReactorConfig::new(30, 60, InputPair::new(1, 2), InputPair::new(3, 4));
        let mut r = SignalReactor::new(config, dsp.clone(), NullPipeline, Shutdowns::default()).unwrap();
        r.prime();
        assert_eq!(dsp.0.borrow().len(), 2);
    }

    #[test]
    fn test_run_stops_when_source_closes() {
        let (tx, rx) = crate::queue::update_queue();
        tx.send(SignalUpdate::new().with(signals::HU_VOLUME_STATUS, 12));
        drop(tx);

        let mut r = reactor();
        let outcome = run(&rx, &mut r, Duration::from_millis(5));
        assert_eq!(outcome, RunOutcome::SourceClosed);
        assert_eq!(r.state().volume, 12);
    }
}
