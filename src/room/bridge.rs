//! Room bridge: connection lifecycle and track publication
//!
//! The bridge is the only writer of [`RoomConnectionState`]. Every failure
//! below `connect` is logged and swallowed so voice turns never depend on the
//! room being up. Provider calls run outside the connection lock and give up
//! after the bridge's call timeout.

use super::track::{LocalTrack, TrackHandle};
use crate::{MurmurError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// How long a single publish or unpublish may take before it is abandoned
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RoomConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for RoomConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RoomConnectionState::Disconnected => "disconnected",
            RoomConnectionState::Connecting => "connecting",
            RoomConnectionState::Connected => "connected",
            RoomConnectionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Out-of-band notifications from an established connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSignal {
    Disconnected { reason: String },
}

/// Provider that can open a room connection
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Connect and return the live connection plus its signal channel.
    /// A closed signal channel is treated as a disconnect.
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<(Arc<dyn RoomConnection>, mpsc::UnboundedReceiver<RoomSignal>)>;
}

/// An established room connection
#[async_trait]
pub trait RoomConnection: Send + Sync {
    /// Publish a local track, returning the provider's track id
    async fn publish(&self, track: LocalTrack) -> Result<String>;

    async fn unpublish(&self, sid: &str) -> Result<()>;

    async fn close(&self);
}

struct BridgeInner {
    transport: Option<Arc<dyn RoomTransport>>,
    state: watch::Sender<RoomConnectionState>,
    connection: Mutex<Option<Arc<dyn RoomConnection>>>,
    // Bumped on every connect and disconnect; handles from an older epoch are stale.
    epoch: AtomicU64,
}

#[derive(Clone)]
pub struct RoomBridge {
    inner: Arc<BridgeInner>,
    call_timeout: Duration,
}

impl RoomBridge {
    pub fn new(transport: Arc<dyn RoomTransport>) -> Self {
        Self::with_transport(Some(transport))
    }

    /// A bridge with no provider; it stays disconnected and every publish is a no-op
    pub fn disabled() -> Self {
        Self::with_transport(None)
    }

    fn with_transport(transport: Option<Arc<dyn RoomTransport>>) -> Self {
        let (state, _) = watch::channel(RoomConnectionState::Disconnected);
        Self {
            inner: Arc::new(BridgeInner {
                transport,
                state,
                connection: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.transport.is_some()
    }

    pub fn state(&self) -> RoomConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RoomConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == RoomConnectionState::Connected
    }

    /// Connect to the room. Idempotent while already connected.
    pub async fn connect(&self, token: &str, url: &str) -> Result<()> {
        let transport = self
            .inner
            .transport
            .clone()
            .ok_or_else(|| MurmurError::RoomUnavailable("no room provider configured".into()))?;

        let mut connection = self.inner.connection.lock().await;
        if connection.is_some() && self.is_connected() {
            debug!("Room already connected");
            return Ok(());
        }

        info!("Connecting to room at {} (token: {} bytes)", url, token.len());
        self.inner.state.send_replace(RoomConnectionState::Connecting);

        match transport.connect(url, token).await {
            Ok((conn, signals)) => {
                let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                *connection = Some(conn);
                self.inner.state.send_replace(RoomConnectionState::Connected);
                self.spawn_signal_watcher(signals, epoch);
                info!("Room connected");
                Ok(())
            }
            Err(e) => {
                warn!("Room connection failed: {}", e);
                self.inner.state.send_replace(RoomConnectionState::Failed);
                Err(match e {
                    MurmurError::RoomUnavailable(_) => e,
                    other => MurmurError::RoomUnavailable(other.to_string()),
                })
            }
        }
    }

    /// The live connection and its epoch. The lock is released before any
    /// provider call is made.
    async fn live_connection(&self) -> Option<(Arc<dyn RoomConnection>, u64)> {
        let connection = self.inner.connection.lock().await;
        match connection.as_ref() {
            Some(conn) if self.is_connected() => {
                Some((Arc::clone(conn), self.inner.epoch.load(Ordering::SeqCst)))
            }
            _ => None,
        }
    }

    /// Publish a local track. Returns `None` when disconnected, when the
    /// provider rejects the track, or when it does not answer in time.
    pub async fn publish(&self, track: LocalTrack) -> Option<TrackHandle> {
        let (conn, epoch) = match self.live_connection().await {
            Some(live) => live,
            None => {
                debug!("Room not connected; skipping publish of {}", track.name());
                return None;
            }
        };

        let name = track.name().to_string();
        match tokio::time::timeout(self.call_timeout, conn.publish(track)).await {
            Ok(Ok(sid)) => {
                debug!("Published track {} ({})", name, sid);
                Some(TrackHandle::new(sid, name, epoch))
            }
            Ok(Err(e)) => {
                warn!("Failed to publish track {}: {}", name, e);
                None
            }
            Err(_) => {
                warn!("Publishing track {} timed out after {:?}", name, self.call_timeout);
                None
            }
        }
    }

    /// Unpublish a track. A no-op when disconnected or when the handle
    /// belongs to an earlier connection.
    pub async fn unpublish(&self, handle: TrackHandle) {
        let conn = match self.live_connection().await {
            Some((conn, epoch)) if handle.epoch() == epoch => conn,
            Some(_) => {
                debug!("Stale handle for {}; nothing to unpublish", handle.name());
                return;
            }
            None => {
                debug!("Room not connected; dropping handle for {}", handle.name());
                return;
            }
        };

        match tokio::time::timeout(self.call_timeout, conn.unpublish(handle.sid())).await {
            Ok(Ok(())) => debug!("Unpublished track {}", handle.name()),
            Ok(Err(e)) => warn!("Failed to unpublish track {}: {}", handle.name(), e),
            Err(_) => warn!(
                "Unpublishing track {} timed out after {:?}",
                handle.name(),
                self.call_timeout
            ),
        }
    }

    /// Close the connection if one is open
    pub async fn disconnect(&self) {
        let conn = self.inner.connection.lock().await.take();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(conn) = conn {
            conn.close().await;
            info!("Room disconnected");
        }
        self.inner.state.send_replace(RoomConnectionState::Disconnected);
    }

    fn spawn_signal_watcher(&self, mut signals: mpsc::UnboundedReceiver<RoomSignal>, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let reason = match signals.recv().await {
                Some(RoomSignal::Disconnected { reason }) => reason,
                None => "signal channel closed".to_string(),
            };

            let mut connection = inner.connection.lock().await;
            // A newer connect or an explicit disconnect already moved on.
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            warn!("Room connection lost: {}", reason);
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            connection.take();
            inner.state.send_replace(RoomConnectionState::Disconnected);
        });
    }
}

impl fmt::Debug for RoomBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomBridge")
            .field("enabled", &self.is_enabled())
            .field("state", &self.state())
            .finish()
    }
}
