//! Host power-off

use can_audio_reactor::ShutdownEffect;
use std::process::Command;

const SYSTEMCTL_BIN: &str = "/usr/bin/systemctl";

/// Powers the host off through systemd and exits the process
pub struct SystemShutdown;

impl ShutdownEffect for SystemShutdown {
    fn shutdown(&mut self) {
        log::info!("Full system shutdown initiated");
        if let Err(e) = Command::new(SYSTEMCTL_BIN).arg("poweroff").status() {
            log::error!("Couldn't run `systemctl poweroff`: {}", e);
        }
        log::logger().flush();
        std::process::exit(0);
    }
}
