//! FIFO handoff between the update source and the reactor
//!
//! The queue is the only synchronisation point between the producer thread
//! and the reactor thread. Events come out in arrival order, one at a time.

use crate::types::SignalUpdate;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// One item handed to the reactor
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A decoded frame
    Update(SignalUpdate),
    /// The transport had nothing to deliver; still drives the grace check
    Idle,
}

/// Producer side of the update queue
#[derive(Clone)]
pub struct UpdateSender {
    tx: Sender<QueueEvent>,
}

/// Consumer side of the update queue
pub struct UpdateReceiver {
    rx: Receiver<QueueEvent>,
}

/// Create a connected sender/receiver pair
pub fn update_queue() -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (UpdateSender { tx }, UpdateReceiver { rx })
}

impl UpdateSender {
    /// Queue a decoded update. Returns false once the reactor is gone.
    pub fn send(&self, update: SignalUpdate) -> bool {
        self.tx.send(QueueEvent::Update(update)).is_ok()
    }

    /// Queue an idle marker. Returns false once the reactor is gone.
    pub fn send_idle(&self) -> bool {
        self.tx.send(QueueEvent::Idle).is_ok()
    }
}

impl UpdateReceiver {
    /// Wait up to `timeout` for the next event
    ///
    /// An elapsed timeout is reported as [`QueueEvent::Idle`]. Returns `None`
    /// once every sender has been dropped and the queue is drained.
    pub fn next(&self, timeout: Duration) -> Option<QueueEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => Some(QueueEvent::Idle),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of events waiting
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
