//! miniDSP HTTP client and daemon process
//!
//! The DSP is driven through the `minidsp-rs` daemon's HTTP API: every batch
//! of commands becomes one JSON `POST {base}/config` request.

use anyhow::{Context, Result};
use can_audio_reactor::{DspBatch, DspCommand, DspSink, ReactorError};
use reqwest::blocking::Client;
use serde::Serialize;
use std::path::Path;
use std::process::{Child, Command};
use std::time::Duration;

/// JSON body of a device config request
#[derive(Debug, Default, Serialize, PartialEq)]
struct ConfigPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    master_status: Option<MasterStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<InputStatus>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
struct MasterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mute: Option<bool>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InputStatus {
    index: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mute: Option<bool>,
}

impl ConfigPayload {
    /// Merge a batch into one payload; later commands win for the same field
    fn from_batch(batch: &DspBatch) -> Self {
        let mut payload = ConfigPayload::default();
        for command in batch.commands() {
            match *command {
                DspCommand::SetMasterVolume(level) => {
                    payload.master_status.get_or_insert_with(Default::default).volume = Some(level);
                }
                DspCommand::SetMasterMute(muted) => {
                    payload.master_status.get_or_insert_with(Default::default).mute = Some(muted);
                }
                DspCommand::SetInputVolume { input, level } => {
                    payload.input(input).gain = Some(level);
                }
                DspCommand::SetInputMute { input, muted } => {
                    payload.input(input).mute = Some(muted);
                }
            }
        }
        payload
    }

    fn input(&mut self, index: u8) -> &mut InputStatus {
        let position = match self.inputs.iter().position(|i| i.index == index) {
            Some(position) => position,
            None => {
                self.inputs.push(InputStatus {
                    index,
                    gain: None,
                    mute: None,
                });
                self.inputs.len() - 1
            }
        };
        &mut self.inputs[position]
    }
}

/// Sends DSP batches to the miniDSP daemon
pub struct MiniDspClient {
    http: Client,
    base_url: String,
    test_mode: bool,
}

impl MiniDspClient {
    /// Create a client for `base_url` (`http://host:port/devices/N`)
    pub fn new(base_url: impl Into<String>, timeout: Duration, test_mode: bool) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            test_mode,
        })
    }

    fn config_url(&self) -> String {
        format!("{}/config", self.base_url)
    }
}

impl DspSink for MiniDspClient {
    fn submit(&mut self, batch: &DspBatch) -> can_audio_reactor::Result<()> {
        let payload = ConfigPayload::from_batch(batch);

        if self.test_mode {
            let body = serde_json::to_string(&payload)
                .map_err(|e| ReactorError::DspTransport(e.to_string()))?;
            log::info!("DSP test mode, not sending: {}", body);
            return Ok(());
        }

        let response = self
            .http
            .post(self.config_url())
            .json(&payload)
            .send()
            .map_err(|e| ReactorError::DspTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReactorError::DspTransport(format!(
                "received status code {} for payload {:?}",
                status, payload
            )));
        }
        Ok(())
    }
}

/// The `minidsp-rs` daemon process, killed when dropped
pub struct DspDaemon {
    child: Child,
}

impl DspDaemon {
    pub fn spawn(bin_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut command = Command::new(bin_path);
        if let Some(config_path) = config_path {
            command.arg("--config").arg(config_path);
        }
        log::debug!("Starting DSP daemon: {:?}", command);
        let child = command
            .spawn()
            .with_context(|| format!("Failed to start DSP daemon {:?}", bin_path))?;
        Ok(Self { child })
    }
}

impl Drop for DspDaemon {
    fn drop(&mut self) {
        log::debug!("Killing DSP daemon");
        if let Err(e) = self.child.kill() {
            log::warn!("Couldn't kill DSP daemon: {}", e);
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_merges_inputs() {
        let batch = DspBatch::new()
            .input_mute(&[1, 2], true)
            .input_volume(&[1, 2], -127.0);
        let payload = ConfigPayload::from_batch(&batch);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "inputs": [
                    {"index": 1, "gain": -127.0, "mute": true},
                    {"index": 2, "gain": -127.0, "mute": true},
                ]
            })
        );
    }

    #[test]
    fn test_payload_master_status() {
        let batch = DspBatch::new().master_volume(-20.0).master_mute(false);
        let payload = ConfigPayload::from_batch(&batch);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"master_status": {"volume": -20.0, "mute": false}})
        );
    }

    #[test]
    fn test_later_command_wins() {
        let batch = DspBatch::new()
            .input_volume(&[4], -50.0)
            .input_volume(&[4], -10.0);
        let payload = ConfigPayload::from_batch(&batch);
        assert_eq!(payload.inputs.len(), 1);
        assert_eq!(payload.inputs[0].gain, Some(-10.0));
    }

    #[test]
    fn test_mode_does_not_send() {
        let mut client =
            MiniDspClient::new("http://127.0.0.1:1/devices/0", Duration::from_millis(100), true)
                .unwrap();
        assert!(client.submit(&DspBatch::new().master_mute(true)).is_ok());
    }

    #[test]
    fn test_unreachable_daemon_is_transport_error() {
        let mut client =
            MiniDspClient::new("http://127.0.0.1:1/devices/0", Duration::from_millis(200), false)
                .unwrap();
        let result = client.submit(&DspBatch::new().master_mute(true));
        assert!(matches!(result, Err(ReactorError::DspTransport(_))));
    }
}
