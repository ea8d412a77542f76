//! Transport seam
//!
//! The FLDT engine does not own a socket or a radio; it hands fully encoded
//! payloads to a [`Transport`] supplied by the integrator. Broadcast framing,
//! MAC addressing and retransmission on the physical medium are the
//! transport's business.

use iotrust_protocol::{FldtCommand, PeerAddr};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport rejected outgoing message: {0}")]
    SendFailed(String),
}

/// Outgoing-message sink
pub trait Transport: Send + Sync {
    /// Send one FLDT message to `peer`
    fn send(
        &self,
        peer: &PeerAddr,
        command: FldtCommand,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Send one FLDT message to every reachable peer
    fn broadcast(&self, command: FldtCommand, payload: &[u8]) -> Result<(), TransportError> {
        self.send(&PeerAddr::BROADCAST, command, payload)
    }
}

/// One captured outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub peer: PeerAddr,
    pub command: FldtCommand,
    pub payload: Vec<u8>,
}

/// Queue-backed transport: messages pile up until the harness drains them.
///
/// Used by the integration tests to wire a client and a server back to back
/// without a network.
#[derive(Default)]
pub struct QueueTransport {
    queue: Mutex<VecDeque<SentMessage>>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the oldest captured message
    pub fn pop(&self) -> Option<SentMessage> {
        self.queue.lock().ok()?.pop_front()
    }

    /// Drain everything captured so far
    pub fn drain(&self) -> Vec<SentMessage> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for QueueTransport {
    fn send(
        &self,
        peer: &PeerAddr,
        command: FldtCommand,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| TransportError::SendFailed("Queue lock poisoned".into()))?;
        queue.push_back(SentMessage {
            peer: *peer,
            command,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
