//! SocketCAN transport
//!
//! Brings the CAN interface up at the configured bitrate, then receives
//! frames, decodes them through the signal database and queues the results.
//! A receive timeout queues an idle marker instead.

use can_audio_reactor::decode::EXTENDED_ID_FLAG;
use can_audio_reactor::{ReactorError, Result, SignalDatabase, UpdateSender};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Id, Socket};
use std::io::ErrorKind;
use std::process::Command;
use std::time::Duration;

const IP_BIN: &str = "/usr/sbin/ip";

/// Reconfigure the interface: down, set bitrate, up
///
/// Failures here are logged only; whether the bus is usable is decided when
/// the socket is opened.
pub fn bring_up(device: &str, bitrate: u32) {
    log::debug!("Starting up CANBUS interface `{}`", device);
    run_ip(&["link", "set", device, "down"]);
    log::debug!("Setting CANBUS interface `{}` bitrate to `{}`", device, bitrate);
    run_ip(&["link", "set", device, "type", "can", "bitrate", &bitrate.to_string()]);
    run_ip(&["link", "set", device, "up"]);
}

/// Take the interface down
pub fn bring_down(device: &str) {
    log::debug!("Shutting down CANBUS device `{}`", device);
    run_ip(&["link", "set", device, "down"]);
}

fn run_ip(args: &[&str]) {
    match Command::new(IP_BIN).args(args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => log::warn!("`ip {}` exited with {}", args.join(" "), status),
        Err(e) => log::warn!("Couldn't run `ip {}`: {}", args.join(" "), e),
    }
}

/// CAN ID in the database's convention: extended frames carry bit 31
fn database_id(frame: &CanFrame) -> u32 {
    match EmbeddedFrame::id(frame) {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw() | EXTENDED_ID_FLAG,
    }
}

/// Receives and decodes frames from one CAN interface
pub struct BusListener {
    socket: CanSocket,
    database: SignalDatabase,
}

impl BusListener {
    /// Open the interface with a bounded receive timeout
    pub fn open(device: &str, recv_timeout: Duration, database: SignalDatabase) -> Result<Self> {
        let socket = CanSocket::open(device).map_err(|e| {
            ReactorError::Bus(format!("Error initializing CANBUS device {}: {}", device, e))
        })?;
        socket.set_read_timeout(recv_timeout).map_err(|e| {
            ReactorError::Bus(format!("Failed to set receive timeout on {}: {}", device, e))
        })?;
        Ok(Self { socket, database })
    }

    /// Receive until the reactor goes away or the socket fails
    pub fn listen(&self, sender: &UpdateSender) -> Result<()> {
        loop {
            let delivered = match self.socket.read_frame() {
                Ok(CanFrame::Error(frame)) => {
                    log::trace!("CAN error frame received: {:?}", frame);
                    true
                }
                Ok(frame) => {
                    let can_id = database_id(&frame);
                    match self.database.decode(can_id, EmbeddedFrame::data(&frame)) {
                        Some(update) => sender.send(update),
                        None => {
                            log::trace!("Unknown CANBUS message received: 0x{:X}", can_id);
                            true
                        }
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    log::trace!("No CANBUS message received, queueing idle marker");
                    sender.send_idle()
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => true,
                Err(e) => {
                    return Err(ReactorError::Bus(format!("CANBUS receive failed: {}", e)))
                }
            };

            if !delivered {
                log::debug!("Reactor queue closed, stopping listener");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socketcan::{ExtendedId, StandardId};

    #[test]
    fn test_extended_frames_carry_flag() {
        let standard = StandardId::new(0x400).unwrap();
        let extended = ExtendedId::new(0x400).unwrap();
        let standard_frame = <CanFrame as EmbeddedFrame>::new(standard, &[1]).unwrap();
        let extended_frame = <CanFrame as EmbeddedFrame>::new(extended, &[1]).unwrap();

        assert_eq!(database_id(&standard_frame), 0x400);
        assert_eq!(database_id(&extended_frame), 0x400 | EXTENDED_ID_FLAG);
    }
}
