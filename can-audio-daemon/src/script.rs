//! Scripted update source for bench testing without a bus

use can_audio_reactor::signals::{HU_MUTE_STATUS, HU_VEHICLE_POWER, HU_VOLUME_STATUS, NO_OP};
use can_audio_reactor::{SignalUpdate, UpdateSender};
use std::time::Duration;

/// Power off, volume up, mute toggle, power back on
pub fn test_script() -> Vec<SignalUpdate> {
    [
        (NO_OP, 0),
        (HU_VEHICLE_POWER, 0),
        (HU_VOLUME_STATUS, 20),
        (HU_VOLUME_STATUS, 30),
        (HU_MUTE_STATUS, 1),
        (HU_MUTE_STATUS, 0),
        (HU_VEHICLE_POWER, 2),
    ]
    .into_iter()
    .map(|(name, value)| SignalUpdate::new().with(name, value))
    .collect()
}

/// Queue every scripted update with `pause` after each
pub fn play(sender: &UpdateSender, pause: Duration) {
    log::info!("Test mode set, performing test commands");
    for update in test_script() {
        log::debug!("Issuing test command: {:?}", update);
        if !sender.send(update) {
            log::warn!("Reactor queue closed before the script finished");
            return;
        }
        std::thread::sleep(pause);
    }
}
