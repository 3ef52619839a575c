//! Main [`Portal`] client implementation.
//!
//! This module provides the family-agnostic [`Portal`] that turns colour,
//! tag and auth calls into protocol requests on a [`Comms`] session.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::comms::{Comms, CommsConfig};
use crate::error::{Error, Result};
use crate::event::{CallbackSlot, EventBroadcaster, Subscription, TagCallback, TagObserver};
use crate::protocol::CommandType;
#[cfg(feature = "hid")]
use crate::transport::{HidTransport, list_devices};
use crate::transport::Transport;
use crate::types::{AuthMode, Color, Platform, Tag, TagChangeEvent};
use crate::variant::CommsDefinition;

/// Pseudo tag index that addresses the portal's auth configuration.
const AUTH_TAG_INDEX: u8 = 84;

/// Events buffered per subscriber.
const EVENT_CAPACITY: usize = 64;

/// Default fade cycle duration.
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_secs(1);

/// Default fade half-cycle count (off, on, off).
pub const DEFAULT_FADE_COUNT: u8 = 2;

/// Default flash on/off duration.
pub const DEFAULT_FLASH_DURATION: Duration = Duration::from_millis(200);

/// Default flash half-cycle count.
pub const DEFAULT_FLASH_COUNT: u8 = 6;

/// Portal lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalState {
    /// Created, not yet connected.
    Disconnected,
    /// Read loop running, activation in progress.
    Connecting,
    /// Activated and ready for commands.
    Connected,
    /// Torn down; cannot reconnect.
    Closed,
}

/// Client for one portal.
pub struct Portal<T> {
    comms: Comms<T>,
    callback: Arc<CallbackSlot>,
    broadcaster: EventBroadcaster,
    state: Mutex<PortalState>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

#[cfg(feature = "hid")]
impl Portal<HidTransport> {
    /// Opens a portal of the given family, optionally by serial number.
    ///
    /// # Returns
    ///
    /// A new portal (not yet connected).
    pub fn open(definition: &'static CommsDefinition, serial: Option<&str>) -> Result<Self> {
        let transport = HidTransport::open(definition.vendor_id, definition.product_id, serial)?;
        Ok(Self::new(transport, definition))
    }

    /// Opens every attached portal of the given family.
    pub fn enumerate(definition: &'static CommsDefinition) -> Result<Vec<Self>> {
        list_devices(definition.vendor_id, definition.product_id)?
            .iter()
            .map(|serial| Self::open(definition, Some(serial.as_str())))
            .collect()
    }
}

impl<T: Transport> Portal<T> {
    /// Creates a portal over the given transport.
    #[must_use]
    pub fn new(transport: T, definition: &'static CommsDefinition) -> Self {
        Self::with_config(transport, definition, CommsConfig::new())
    }

    /// Creates a portal with custom session configuration.
    #[must_use]
    pub fn with_config(
        transport: T,
        definition: &'static CommsDefinition,
        config: CommsConfig,
    ) -> Self {
        let comms = Comms::with_config(transport, definition, config);
        let callback = Arc::new(CallbackSlot::new());
        let broadcaster = EventBroadcaster::new(EVENT_CAPACITY);
        let slot: Arc<dyn TagObserver> = Arc::clone(&callback) as Arc<dyn TagObserver>;
        comms.add_observer(slot);
        comms.add_observer(Arc::new(broadcaster.clone()));

        Self {
            comms,
            callback,
            broadcaster,
            state: Mutex::new(PortalState::Disconnected),
            read_task: Mutex::new(None),
        }
    }

    /// Connects to the portal.
    ///
    /// This will:
    /// 1. Start the background read loop
    /// 2. Send the activation command
    /// 3. List tags to warm the UID cache, for families that need it
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the portal is freshly created. If
    /// activation or the initial tag listing fails the portal is closed.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != PortalState::Disconnected {
                return Err(Error::InvalidState { state: *state });
            }
            *state = PortalState::Connecting;
        }

        let definition = self.comms.definition();
        tracing::info!("connecting to {} portal", definition.name);
        *self.read_task.lock().await = Some(self.comms.start());

        if let Err(e) = self.send_activate().await {
            tracing::warn!("activation failed: {}", e);
            self.disconnect().await;
            return Err(e);
        }
        *self.state.lock().await = PortalState::Connected;

        if definition.prewarm_uid_cache {
            match self.get_all_tags().await {
                Ok(tags) => {
                    let count: usize = tags.values().map(Vec::len).sum();
                    tracing::debug!("{count} tags already on the portal");
                }
                Err(e) => {
                    tracing::warn!("initial tag listing failed: {}", e);
                    self.disconnect().await;
                    return Err(e);
                }
            }
        }

        tracing::info!("connected to {} portal", definition.name);
        Ok(())
    }

    /// Disconnects from the portal. The portal cannot be reconnected.
    ///
    /// Requests still waiting for replies fail with `ChannelClosed`.
    pub async fn disconnect(&self) {
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.comms.cancel_pending().await;
        // Drop the callback so it can't keep this portal alive
        self.callback.set(None).await;

        let mut state = self.state.lock().await;
        if *state != PortalState::Closed {
            tracing::info!("disconnected from {} portal", self.comms.definition().name);
            *state = PortalState::Closed;
        }
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> PortalState {
        *self.state.lock().await
    }

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        self.state().await == PortalState::Connected
    }

    /// Returns the session for direct command access.
    #[must_use]
    pub const fn comms(&self) -> &Comms<T> {
        &self.comms
    }

    /// Sets the callback invoked once per tag change. Replaces any previous one.
    pub async fn on_tags_changed<F, Fut>(&self, callback: F)
    where
        F: Fn(TagChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: TagCallback =
            Arc::new(move |event| -> BoxFuture<'static, ()> { Box::pin(callback(event)) });
        self.callback.set(Some(callback)).await;
    }

    /// Removes the tag change callback.
    pub async fn clear_tags_changed(&self) {
        self.callback.set(None).await;
    }

    /// Subscribes to tag change events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    // ==================== Tag Methods ====================

    /// Sends the activation command.
    pub async fn activate(&self) -> Result<()> {
        self.ensure_connected().await?;
        self.send_activate().await
    }

    /// Lists the tags currently on the portal, without UIDs.
    pub async fn get_tag_index(&self) -> Result<Vec<Tag>> {
        self.ensure_connected().await?;
        let data = self.comms.send_message(CommandType::ListTags, &[]).await?;
        Ok(data
            .chunks_exact(2)
            .map(|record| Tag::from_record([record[0], record[1]]))
            .collect())
    }

    /// Lists the tags on the portal grouped by platform code, resolving UIDs
    /// where possible.
    pub async fn get_all_tags(&self) -> Result<BTreeMap<u8, Vec<Tag>>> {
        let tags = self.get_tag_index().await?;

        let mut by_platform: BTreeMap<u8, Vec<Tag>> = BTreeMap::new();
        for mut tag in tags {
            if tag.uid.is_none() {
                tag.uid = self.comms.get_tag_uid(&tag).await?;
            }
            by_platform.entry(tag.platform).or_default().push(tag);
        }
        Ok(by_platform)
    }

    /// Reads a block from a tag.
    ///
    /// Always returns 16 bytes; on tags with 4-byte blocks the following
    /// three blocks fill out the response.
    pub async fn read_tag(&self, tag: &Tag, block: u8) -> Result<Bytes> {
        self.ensure_connected().await?;
        let mut msg = vec![tag.index];
        msg.extend(self.comms.definition().block_address(block));

        let data = self.comms.send_message(CommandType::ReadBlock, &msg).await?;
        self.check_reply_status(&data)?;
        Ok(data.slice(1..))
    }

    /// Writes a block to a tag.
    ///
    /// `data` must match the tag's block size.
    pub async fn write_tag(&self, tag: &Tag, block: u8, data: &[u8]) -> Result<()> {
        self.ensure_connected().await?;
        let mut msg = vec![tag.index];
        msg.extend(self.comms.definition().block_address(block));
        msg.extend_from_slice(data);

        let reply = self.comms.send_message(CommandType::WriteBlock, &msg).await?;
        self.check_reply_status(&reply)
    }

    /// Configures tag password authentication.
    pub async fn set_auth(&self, mode: AuthMode) -> Result<()> {
        self.ensure_connected().await?;
        let mut msg = vec![AUTH_TAG_INDEX, mode.code()];
        if let AuthMode::Custom(password) = mode {
            msg.extend_from_slice(&password);
        }

        let reply = self.comms.send_message(CommandType::TagPassword, &msg).await?;
        self.check_reply_status(&reply)
    }

    /// Enables or disables the NFC field.
    pub async fn set_nfc_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_connected().await?;
        // No status in the reply
        self.comms
            .send_message(CommandType::NfcOn, &[u8::from(enabled)])
            .await?;
        Ok(())
    }

    // ==================== Colour Methods ====================

    /// Sets a platform's colour.
    pub async fn set_color(&self, platform: impl Into<Platform>, color: Color) -> Result<()> {
        self.ensure_connected().await?;
        let [r, g, b] = color.to_bytes();
        self.send_fire_and_forget(CommandType::SetOne, &[platform.into().as_byte(), r, g, b])
            .await
    }

    /// Fades a platform's colour in and out.
    ///
    /// # Arguments
    ///
    /// * `duration` - Duration of each cycle
    /// * `count` - Half-cycles to perform: 1 is off-to-on, 2 is off-on-off
    pub async fn fade_color(
        &self,
        platform: impl Into<Platform>,
        color: Color,
        duration: Duration,
        count: u8,
    ) -> Result<()> {
        self.ensure_connected().await?;
        let ticks = self.comms.definition().ticks(duration);
        let [r, g, b] = color.to_bytes();
        self.send_fire_and_forget(
            CommandType::FadeOne,
            &[platform.into().as_byte(), ticks, count, r, g, b],
        )
        .await
    }

    /// Flashes a platform on and off.
    ///
    /// # Arguments
    ///
    /// * `on_time` - Duration of each on phase
    /// * `off_time` - Duration of each off phase
    /// * `count` - Half-cycles to perform
    pub async fn flash_color(
        &self,
        platform: impl Into<Platform>,
        color: Color,
        on_time: Duration,
        off_time: Duration,
        count: u8,
    ) -> Result<()> {
        self.ensure_connected().await?;
        let definition = self.comms.definition();
        let [r, g, b] = color.to_bytes();
        self.send_fire_and_forget(
            CommandType::FlashOne,
            &[
                platform.into().as_byte(),
                definition.ticks(on_time),
                definition.ticks(off_time),
                count,
                r,
                g,
                b,
            ],
        )
        .await
    }

    /// Fades a platform between its current colour and random others.
    ///
    /// # Arguments
    ///
    /// * `duration` - Duration of each half-cycle
    /// * `count` - Half-cycles to perform: 1 is src-to-dest, 2 is src-dest-src
    pub async fn fade_random(
        &self,
        platform: impl Into<Platform>,
        duration: Duration,
        count: u8,
    ) -> Result<()> {
        self.ensure_connected().await?;
        let ticks = self.comms.definition().ticks(duration);
        self.send_fire_and_forget(
            CommandType::RandomOne,
            &[platform.into().as_byte(), ticks, count],
        )
        .await
    }

    // ==================== Internals ====================

    async fn ensure_connected(&self) -> Result<()> {
        if *self.state.lock().await == PortalState::Connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn send_activate(&self) -> Result<()> {
        let activation = self.comms.definition().activation;
        self.comms
            .send_message(CommandType::Activate, activation)
            .await?;
        Ok(())
    }

    /// Sends a command whose reply only acknowledges receipt.
    async fn send_fire_and_forget(&self, command: CommandType, data: &[u8]) -> Result<()> {
        self.comms.send_message(command, data).await?;
        Ok(())
    }

    fn check_reply_status(&self, reply: &[u8]) -> Result<()> {
        let status = reply.first().ok_or_else(|| Error::Protocol {
            message: "reply missing status byte".into(),
        })?;
        self.comms.check_status(*status)
    }
}

impl<T> Drop for Portal<T> {
    fn drop(&mut self) {
        // Abort background task
        if let Some(task) = self.read_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::protocol::ErrorType;
    use crate::transport::mock::{MockDevice, MockTransport, Written};
    use crate::types::Uid;
    use crate::variant::{DIMENSIONS, INFINITY};

    const TEST_CONFIG: CommsConfig = CommsConfig::new()
        .read_timeout(Duration::from_millis(10))
        .reply_timeout(Duration::from_secs(2));

    const BLOCK: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
        0x10,
    ];

    fn portal(
        definition: &'static CommsDefinition,
        responder: impl Fn(&Written) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> (Portal<MockTransport>, MockDevice) {
        let (transport, device) = MockTransport::new(definition.reply_id, responder);
        (Portal::with_config(transport, definition, TEST_CONFIG), device)
    }

    /// Replies with an empty payload except where `special` answers.
    fn ack_or(
        special: impl Fn(&Written) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> impl Fn(&Written) -> Option<Vec<u8>> + Send + Sync + 'static {
        move |w| special(w).or_else(|| Some(Vec::new()))
    }

    #[tokio::test]
    async fn test_connect_and_list_tags() {
        let (portal, device) = portal(
            &DIMENSIONS,
            ack_or(|w| (w.opcode == 0xd0).then(|| vec![0x01, 0x09, 0x21, 0x00])),
        );

        portal.connect().await.unwrap();
        assert_eq!(portal.state().await, PortalState::Connected);
        assert_eq!(device.written_with(0xb0)[0].payload, b"(c) LEGO 2014".to_vec());

        let tags = portal.get_tag_index().await.unwrap();
        assert_eq!(tags, vec![Tag::new(0, 1, 0x09), Tag::new(2, 1, 0x00)]);

        let all = portal.get_all_tags().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&0], vec![Tag::new(0, 1, 0x09)]);
        assert_eq!(all[&2], vec![Tag::new(2, 1, 0x00)]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_get_all_tags_empty() {
        let (portal, _device) = portal(&DIMENSIONS, ack_or(|_| None));
        portal.connect().await.unwrap();
        assert!(portal.get_all_tags().await.unwrap().is_empty());
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_prewarms_uid_cache() {
        let (portal, device) = portal(
            &INFINITY,
            ack_or(|w| match w.opcode {
                0xa1 => Some(vec![0x13, 0x09]),
                0xb4 => Some(vec![0x00, 1, 2, 3, 4, 5, 6, 7]),
                _ => None,
            }),
        );

        portal.connect().await.unwrap();

        let opcodes: Vec<u8> = device.written().iter().map(|w| w.opcode).collect();
        assert_eq!(opcodes, vec![0x80, 0xa1, 0xb4]);
        assert_eq!(
            portal.comms().cached_uid(3).await,
            Some(Uid::new([1, 2, 3, 4, 5, 6, 7]))
        );
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_tag_sector_addressing() {
        let (portal, device) = portal(
            &INFINITY,
            ack_or(|w| {
                (w.opcode == 0xa2).then(|| {
                    let mut reply = vec![0x00];
                    reply.extend_from_slice(&BLOCK);
                    reply
                })
            }),
        );
        portal.connect().await.unwrap();

        let data = portal.read_tag(&Tag::new(1, 2, 0x09), 5).await.unwrap();

        assert_eq!(&data[..], &BLOCK);
        assert_eq!(device.written_with(0xa2)[0].payload, vec![2, 1, 1]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_tag_flat_addressing() {
        let (portal, device) = portal(
            &DIMENSIONS,
            ack_or(|w| {
                (w.opcode == 0xd2).then(|| {
                    let mut reply = vec![0x00];
                    reply.extend_from_slice(&BLOCK);
                    reply
                })
            }),
        );
        portal.connect().await.unwrap();

        portal.read_tag(&Tag::new(1, 0, 0x00), 5).await.unwrap();

        assert_eq!(device.written_with(0xd2)[0].payload, vec![0, 5]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_tag_no_such_tag() {
        let (portal, _device) = portal(
            &DIMENSIONS,
            ack_or(|w| (w.opcode == 0xd2).then(|| vec![0xA0])),
        );
        portal.connect().await.unwrap();

        let result = portal.read_tag(&Tag::new(1, 0, 0x00), 0).await;

        assert!(matches!(result, Err(Error::Status(ErrorType::NoSuchTag))));
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_write_tag() {
        let (portal, device) = portal(
            &DIMENSIONS,
            ack_or(|w| (w.opcode == 0xd3).then(|| vec![0x00])),
        );
        portal.connect().await.unwrap();

        portal
            .write_tag(&Tag::new(1, 3, 0x00), 4, &[0x03, 0x00, 0xfe, 0x00])
            .await
            .unwrap();

        assert_eq!(
            device.written_with(0xd3)[0].payload,
            vec![3, 4, 0x03, 0x00, 0xfe, 0x00]
        );
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_write_tag_io_error() {
        let (portal, _device) = portal(
            &INFINITY,
            ack_or(|w| (w.opcode == 0xa3).then(|| vec![0x82])),
        );
        portal.connect().await.unwrap();

        let result = portal.write_tag(&Tag::new(1, 0, 0x09), 1, &BLOCK).await;

        assert!(matches!(result, Err(Error::Status(ErrorType::TagIoError))));
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_set_auth() {
        let (portal, device) = portal(
            &DIMENSIONS,
            ack_or(|w| (w.opcode == 0xe1).then(|| vec![0x00])),
        );
        portal.connect().await.unwrap();

        portal.set_auth(AuthMode::Off).await.unwrap();
        portal
            .set_auth(AuthMode::Custom([0xde, 0xad, 0xbe, 0xef]))
            .await
            .unwrap();

        let written = device.written_with(0xe1);
        assert_eq!(written[0].payload, vec![84, 0]);
        assert_eq!(written[1].payload, vec![84, 2, 0xde, 0xad, 0xbe, 0xef]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_set_auth_unsupported() {
        let (portal, _device) = portal(&INFINITY, ack_or(|_| None));
        portal.connect().await.unwrap();

        assert!(matches!(
            portal.set_auth(AuthMode::Default).await,
            Err(Error::UnsupportedCommand(CommandType::TagPassword))
        ));
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_colour_commands_use_ticks() {
        let (portal, device) = portal(&INFINITY, ack_or(|_| None));
        portal.connect().await.unwrap();
        let blue = Color::new(0, 0, 200);

        portal.set_color(Platform::Center, blue).await.unwrap();
        portal
            .fade_color(2, blue, Duration::from_secs(1), 2)
            .await
            .unwrap();
        portal
            .flash_color(3, blue, Duration::from_millis(250), Duration::from_millis(500), 6)
            .await
            .unwrap();
        portal
            .fade_random(Platform::PlayerOne, Duration::from_secs(2), 3)
            .await
            .unwrap();

        assert_eq!(device.written_with(0x90)[0].payload, vec![1, 0, 0, 200]);
        assert_eq!(device.written_with(0x92)[0].payload, vec![2, 16, 2, 0, 0, 200]);
        assert_eq!(
            device.written_with(0x93)[0].payload,
            vec![3, 4, 8, 6, 0, 0, 200]
        );
        assert_eq!(device.written_with(0x94)[0].payload, vec![2, 32, 3]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_set_nfc_enabled() {
        let (portal, device) = portal(&DIMENSIONS, ack_or(|_| None));
        portal.connect().await.unwrap();

        portal.set_nfc_enabled(true).await.unwrap();

        assert_eq!(device.written_with(0xe5)[0].payload, vec![1]);
        portal.disconnect().await;
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (portal, _device) = portal(&DIMENSIONS, ack_or(|_| None));

        assert!(matches!(
            portal.set_color(1, Color::OFF).await,
            Err(Error::NotConnected)
        ));

        portal.connect().await.unwrap();
        assert!(matches!(
            portal.connect().await,
            Err(Error::InvalidState {
                state: PortalState::Connected
            })
        ));

        portal.disconnect().await;
        assert_eq!(portal.state().await, PortalState::Closed);
        assert!(matches!(
            portal.get_tag_index().await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            portal.connect().await,
            Err(Error::InvalidState {
                state: PortalState::Closed
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_activation_closes() {
        let (transport, _device) = MockTransport::new(DIMENSIONS.reply_id, |_| None);
        let config = TEST_CONFIG.reply_timeout(Duration::from_millis(50));
        let portal = Portal::with_config(transport, &DIMENSIONS, config);

        assert!(matches!(
            portal.connect().await,
            Err(Error::Timeout { .. })
        ));
        assert_eq!(portal.state().await, PortalState::Closed);
    }

    #[tokio::test]
    async fn test_failed_prewarm_closes() {
        let (portal, _device) = portal(
            &INFINITY,
            ack_or(|w| match w.opcode {
                0xa1 => Some(vec![0x13, 0x09]),
                // Truncated tag info reply
                0xb4 => Some(vec![0x00, 1, 2]),
                _ => None,
            }),
        );

        assert!(matches!(
            portal.connect().await,
            Err(Error::Protocol { .. })
        ));
        assert_eq!(portal.state().await, PortalState::Closed);
        assert!(matches!(
            portal.connect().await,
            Err(Error::InvalidState {
                state: PortalState::Closed
            })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_requests() {
        let (portal, _device) = portal(&DIMENSIONS, |w: &Written| {
            (w.opcode != 0xb3).then(Vec::new)
        });
        portal.connect().await.unwrap();
        let comms = portal.comms().clone();
        let request =
            tokio::spawn(async move { comms.send_message(CommandType::GetRng, &[]).await });

        tokio::time::timeout(Duration::from_secs(2), async {
            while portal.comms().pending_requests().await == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        portal.disconnect().await;

        let result = tokio::time::timeout(Duration::from_millis(500), request)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_tags_changed_callback_and_subscription() {
        let (portal, device) = portal(&DIMENSIONS, ack_or(|_| None));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        portal
            .on_tags_changed(move |event| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(event.tag.index, 6);
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        let mut sub = portal.subscribe();
        portal.connect().await.unwrap();

        device.push_event(&[0x03, 0x00, 0x06, 0x00, 1, 2, 3, 4, 5, 6, 7]);

        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.tag.platform, 3);
        assert_eq!(event.tag.uid, Some(Uid::new([1, 2, 3, 4, 5, 6, 7])));
        // Callback is registered ahead of the broadcaster
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        portal.disconnect().await;
    }
}
