//! Transport session for one open portal.
//!
//! [`Comms`] owns the device handle, the read loop, the table of requests
//! awaiting replies, the tag UID cache and the observer list. Replies are
//! matched to requests by sequence number; events are handled in read order
//! on their own task so observers can issue requests without stalling the
//! read loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::TagObserver;
use crate::protocol::{CommandType, Report, check_status, encode_frame, parse_report};
use crate::transport::Transport;
use crate::types::{Tag, TagChangeEvent, Uid};
use crate::variant::{CommsDefinition, RequestSender};

/// Default time a single device read waits for data.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default time a request waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommsConfig {
    /// How long each read loop poll waits for a report.
    pub read_timeout: Duration,
    /// How long a request waits for its reply.
    pub reply_timeout: Duration,
}

impl CommsConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Sets the read poll timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared<T> {
    transport: Arc<T>,
    definition: &'static CommsDefinition,
    config: CommsConfig,
    sequence: AtomicU8,
    pending: Mutex<HashMap<u8, oneshot::Sender<Bytes>>>,
    write_lock: Mutex<()>,
    uid_cache: RwLock<HashMap<u8, Uid>>,
    observers: StdRwLock<Vec<Arc<dyn TagObserver>>>,
}

/// Session with one portal. Cloning shares the session.
pub struct Comms<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Comms<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> Comms<T> {
    /// Creates a session with default configuration.
    #[must_use]
    pub fn new(transport: T, definition: &'static CommsDefinition) -> Self {
        Self::with_config(transport, definition, CommsConfig::new())
    }

    /// Creates a session with custom configuration.
    #[must_use]
    pub fn with_config(
        transport: T,
        definition: &'static CommsDefinition,
        config: CommsConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport: Arc::new(transport),
                definition,
                config,
                sequence: AtomicU8::new(0),
                pending: Mutex::new(HashMap::new()),
                write_lock: Mutex::new(()),
                uid_cache: RwLock::new(HashMap::new()),
                observers: StdRwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the family definition.
    #[must_use]
    pub fn definition(&self) -> &'static CommsDefinition {
        self.shared.definition
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> CommsConfig {
        self.shared.config
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Spawns the read loop.
    ///
    /// Aborting the returned handle stops reading; requests still pending
    /// then fail with a timeout unless [`Comms::cancel_pending`] is called.
    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.shared).run_read_loop())
    }

    /// Registers an observer. Observers run in registration order.
    pub fn add_observer(&self, observer: Arc<dyn TagObserver>) {
        self.shared
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Sends a command and waits for the reply payload.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedCommand` without touching the device if this
    /// family has no opcode for `command`, and with `Timeout` if no reply
    /// arrives within the configured reply timeout.
    pub async fn send_message(&self, command: CommandType, data: &[u8]) -> Result<Bytes> {
        self.shared.send_message(command, data).await
    }

    /// Returns a tag's UID, from the cache or by asking the portal.
    ///
    /// A tag the portal reports absent yields `Ok(None)`.
    pub async fn get_tag_uid(&self, tag: &Tag) -> Result<Option<Uid>> {
        if let Some(uid) = self.cached_uid(tag.index).await {
            return Ok(Some(uid));
        }
        self.shared.fetch_and_cache(tag).await
    }

    /// Returns the cached UID for a tag index.
    pub async fn cached_uid(&self, index: u8) -> Option<Uid> {
        self.shared.uid_cache.read().await.get(&index).copied()
    }

    /// Fails every request awaiting a reply with `ChannelClosed`.
    pub async fn cancel_pending(&self) {
        let mut pending = self.shared.pending.lock().await;
        if !pending.is_empty() {
            tracing::debug!("abandoning {} pending requests", pending.len());
            pending.clear();
        }
    }

    /// Number of requests awaiting a reply.
    pub async fn pending_requests(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Checks a reply status byte using this family's mask.
    pub fn check_status(&self, code: u8) -> Result<()> {
        check_status(code, self.shared.definition.status_mask)
    }
}

impl<T: Transport> RequestSender for Comms<T> {
    fn send_message<'a>(
        &'a self,
        command: CommandType,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<Bytes>> {
        Box::pin(self.shared.send_message(command, data))
    }
}

impl<T: Transport> RequestSender for Shared<T> {
    fn send_message<'a>(
        &'a self,
        command: CommandType,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<Bytes>> {
        Box::pin(Shared::send_message(self, command, data))
    }
}

impl<T: Transport> Shared<T> {
    async fn send_message(&self, command: CommandType, data: &[u8]) -> Result<Bytes> {
        let opcode = self
            .definition
            .opcode(command)
            .ok_or(Error::UnsupportedCommand(command))?;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = encode_frame(opcode, data, sequence, self.definition.magic_prefix)?;

        let (tx, rx) = oneshot::channel();
        if self.pending.lock().await.insert(sequence, tx).is_some() {
            tracing::warn!("sequence {sequence} reused while still pending");
        }

        tracing::trace!("sending {command:?} seq={sequence}: {}", hex::encode(&frame));
        if let Err(e) = self.write(frame).await {
            self.pending.lock().await.remove(&sequence);
            return Err(e);
        }

        let timeout = self.config.reply_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                // Give up our slot unless a newer request already took it
                let mut pending = self.pending.lock().await;
                if pending
                    .get(&sequence)
                    .is_some_and(oneshot::Sender::is_closed)
                {
                    pending.remove(&sequence);
                }
                Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Writes one report; at most one write is in flight.
    async fn write(&self, frame: Bytes) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let transport = Arc::clone(&self.transport);
        tokio::task::spawn_blocking(move || transport.write_report(&frame)).await?
    }

    async fn run_read_loop(self: Arc<Self>) {
        tracing::debug!("{} read loop started", self.definition.name);

        // Single consumer keeps events in read order
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(&self).run_event_loop(events_rx));

        loop {
            let transport = Arc::clone(&self.transport);
            let timeout = self.config.read_timeout;
            let report =
                match tokio::task::spawn_blocking(move || transport.read_report(timeout)).await {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) => {
                        tracing::error!("read loop error: {}", e);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("read task failed: {}", e);
                        break;
                    }
                };

            if report.is_empty() {
                continue;
            }
            self.handle_report(&report, &events_tx).await;
        }

        // Nobody will answer these now
        self.pending.lock().await.clear();
    }

    async fn run_event_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<Bytes>) {
        while let Some(payload) = events.recv().await {
            self.process_event(&payload).await;
        }
        tracing::debug!("{} event loop stopped", self.definition.name);
    }

    async fn handle_report(&self, report: &Bytes, events: &mpsc::UnboundedSender<Bytes>) {
        tracing::trace!("received report: {}", hex::encode(report));

        match parse_report(report, self.definition.reply_id) {
            Ok(None) => {}
            Ok(Some(Report::Reply {
                sequence,
                payload,
                checksum_ok,
            })) => {
                if !checksum_ok {
                    tracing::warn!("checksum mismatch in reply seq={sequence}");
                }
                let pending = self.pending.lock().await.remove(&sequence);
                match pending {
                    Some(tx) => {
                        // Requester may have timed out meanwhile
                        let _ = tx.send(payload);
                    }
                    None => tracing::debug!("dropping orphaned reply seq={sequence}"),
                }
            }
            Ok(Some(Report::Event { payload })) => {
                if events.send(payload).is_err() {
                    tracing::warn!("event loop gone, dropping tag event");
                }
            }
            Ok(Some(Report::Unrecognized(raw))) => {
                tracing::warn!("unknown message received: {}", hex::encode(&raw));
            }
            Err(e) => tracing::warn!("malformed report: {}", e),
        }
    }

    async fn process_event(&self, payload: &[u8]) {
        let mut event = match (self.definition.unpack_tag_event)(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("failed to unpack tag event: {}", e);
                return;
            }
        };
        let index = event.tag.index;

        if let Some(uid) = event.tag.uid {
            self.uid_cache.write().await.insert(index, uid);
        } else {
            let cached = self.uid_cache.read().await.get(&index).copied();
            if cached.is_some() {
                event.tag.uid = cached;
            } else if !event.is_removed {
                event.tag.uid = self.fetch_and_cache(&event.tag).await.unwrap_or_else(|e| {
                    tracing::warn!("failed to fetch UID for tag index {index}: {}", e);
                    None
                });
            }
        }

        if event.is_removed && self.uid_cache.write().await.remove(&index).is_some() {
            tracing::debug!("evicted cached UID for tag index {index}");
        }

        tracing::debug!(
            "{} {}",
            event.tag,
            if event.is_removed { "removed" } else { "placed" }
        );
        self.notify(&event).await;
    }

    async fn notify(&self, event: &TagChangeEvent) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer.tags_updated(event).await;
        }
    }

    async fn fetch_and_cache(&self, tag: &Tag) -> Result<Option<Uid>> {
        match (self.definition.fetch_tag_uid)(self, tag).await {
            Ok(Some(uid)) => {
                self.uid_cache.write().await.insert(tag.index, uid);
                Ok(Some(uid))
            }
            Ok(None) => Ok(None),
            Err(Error::TagNotFound { index }) => {
                tracing::debug!("no tag at index {index}, UID unavailable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
