//! Auto-shutdown after a sustained vehicle power-off

use crate::types::{Timestamp, VehiclePower};
use chrono::Duration;

/// Powers off the host; the real implementation never returns
pub trait ShutdownEffect {
    fn shutdown(&mut self);
}

impl<T: ShutdownEffect + ?Sized> ShutdownEffect for Box<T> {
    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// Debounces the power-off signal and fires the shutdown effect once
pub struct PowerController<S: ShutdownEffect> {
    effect: S,
    grace: Duration,
    fired: bool,
}

impl<S: ShutdownEffect> PowerController<S> {
    pub fn new(effect: S, grace_period_secs: u64) -> Self {
        Self {
            effect,
            grace: Duration::seconds(grace_period_secs as i64),
            fired: false,
        }
    }

    /// True when the vehicle has been off for longer than the grace period
    pub fn grace_expired(
        &self,
        power: VehiclePower,
        power_off_since: Option<Timestamp>,
        now: Timestamp,
    ) -> bool {
        match (power, power_off_since) {
            (VehiclePower::Off, Some(since)) => now - since > self.grace,
            _ => false,
        }
    }

    /// Fire the shutdown effect if the grace period has expired
    ///
    /// Returns true when shutdown was triggered by this call. The effect
    /// fires at most once per controller.
    pub fn maybe_shutdown(
        &mut self,
        power: VehiclePower,
        power_off_since: Option<Timestamp>,
        now: Timestamp,
    ) -> bool {
        if self.fired || !self.grace_expired(power, power_off_since, now) {
            return false;
        }
        log::info!(
            "Vehicle has been powered off for more than {} seconds, shutting down...",
            self.grace.num_seconds()
        );
        self.fired = true;
        self.effect.shutdown();
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
