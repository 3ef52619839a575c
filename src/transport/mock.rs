//! Scripted in-memory transport for tests.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{encode_event, encode_reply};
use crate::transport::Transport;

/// An outbound command as the device sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub opcode: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

impl Written {
    fn parse(report: &[u8]) -> Self {
        let length = usize::from(report[2]);
        Self {
            opcode: report[3],
            sequence: report[4],
            payload: report[5..3 + length].to_vec(),
        }
    }
}

type Responder = Box<dyn Fn(&Written) -> Option<Vec<u8>> + Send + Sync>;

/// Mock transport. Each write is answered by the responder, whose payload is
/// wrapped in a reply report carrying the request's sequence number.
pub struct MockTransport {
    reply_id: u8,
    responder: Responder,
    written: Arc<Mutex<Vec<Written>>>,
    inbound_tx: Sender<Bytes>,
    inbound_rx: Mutex<Receiver<Bytes>>,
}

/// Test-side handle for injecting reports and inspecting writes.
#[derive(Clone)]
pub struct MockDevice {
    reply_id: u8,
    written: Arc<Mutex<Vec<Written>>>,
    inbound_tx: Sender<Bytes>,
}

impl MockTransport {
    pub fn new(
        reply_id: u8,
        responder: impl Fn(&Written) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> (Self, MockDevice) {
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let device = MockDevice {
            reply_id,
            written: Arc::clone(&written),
            inbound_tx: inbound_tx.clone(),
        };
        let transport = Self {
            reply_id,
            responder: Box::new(responder),
            written,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
        };
        (transport, device)
    }
}

impl Transport for MockTransport {
    fn write_report(&self, report: &[u8]) -> Result<()> {
        let written = Written::parse(report);
        self.written.lock().unwrap().push(written.clone());
        if let Some(payload) = (self.responder)(&written) {
            let reply = encode_reply(self.reply_id, written.sequence, &payload)?;
            let _ = self.inbound_tx.send(reply);
        }
        Ok(())
    }

    fn read_report(&self, timeout: Duration) -> Result<Bytes> {
        let rx = self.inbound_rx.lock().unwrap();
        match rx.recv_timeout(timeout) {
            Ok(report) => Ok(report),
            Err(RecvTimeoutError::Timeout) => Ok(Bytes::new()),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "mock device closed",
            ))),
        }
    }
}

impl MockDevice {
    /// Queues an event report.
    pub fn push_event(&self, payload: &[u8]) {
        let report = encode_event(self.reply_id, payload).unwrap();
        self.inbound_tx.send(report).unwrap();
    }

    /// Queues a raw report.
    pub fn push_raw(&self, report: &'static [u8]) {
        self.inbound_tx.send(Bytes::from_static(report)).unwrap();
    }

    /// Returns every command written so far.
    pub fn written(&self) -> Vec<Written> {
        self.written.lock().unwrap().clone()
    }

    /// Returns the commands written with `opcode`.
    pub fn written_with(&self, opcode: u8) -> Vec<Written> {
        self.written()
            .into_iter()
            .filter(|w| w.opcode == opcode)
            .collect()
    }
}
