//! Connection state
//!
//! Publishes whether the backing store is reachable. The transport drives
//! the transitions; subscriptions only read them.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Reachability of the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Not connected (initial state, or lost and reconnecting)
    Disconnected,
    /// Connected and accepting commands
    Connected,
    /// The transport gave up reconnecting
    Exhausted(String),
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Exhausted(reason) => write!(f, "exhausted ({})", reason),
        }
    }
}

/// Latest state together with the time it was entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    /// Current state
    pub state: LinkState,
    /// When the state was entered
    pub changed_at: DateTime<Utc>,
}

impl LinkStatus {
    fn now(state: LinkState) -> Self {
        Self {
            state,
            changed_at: Utc::now(),
        }
    }

    /// Whether commands can be issued
    pub fn is_reachable(&self) -> bool {
        self.state == LinkState::Connected
    }
}

/// Process-wide reachability flag for one store client
///
/// Cloning shares the same underlying channel. New subscribers observe the
/// current value immediately.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<LinkStatus>>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create a new state, initially disconnected
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LinkStatus::now(LinkState::Disconnected));
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current status
    pub fn status(&self) -> LinkStatus {
        self.tx.borrow().clone()
    }

    /// Whether the store is currently reachable
    pub fn is_reachable(&self) -> bool {
        self.tx.borrow().is_reachable()
    }

    /// Subscribe to transitions
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.tx.subscribe()
    }

    /// Record a successful (re)connection
    pub fn set_connected(&self) {
        self.transition(LinkState::Connected);
    }

    /// Record a lost connection
    pub fn set_disconnected(&self) {
        self.transition(LinkState::Disconnected);
    }

    /// Record that the transport stopped reconnecting. Terminal.
    pub fn set_exhausted(&self, reason: impl Into<String>) {
        self.transition(LinkState::Exhausted(reason.into()));
    }

    fn transition(&self, next: LinkState) {
        self.tx.send_if_modified(|status| {
            // Exhausted is terminal; repeated values are not broadcast
            if matches!(status.state, LinkState::Exhausted(_)) || status.state == next {
                return false;
            }
            tracing::info!("Store connection {} -> {}", status.state, next);
            *status = LinkStatus::now(next);
            true
        });
    }

    /// Wait until the store is reachable
    ///
    /// Resolves immediately when already connected. Fails once the transport
    /// has exhausted its retries.
    pub async fn wait_reachable(&self) -> Result<()> {
        let mut rx = self.subscribe();
        wait_reachable_on(&mut rx).await
    }
}

/// Wait on an existing receiver until the store is reachable
pub(crate) async fn wait_reachable_on(rx: &mut watch::Receiver<LinkStatus>) -> Result<()> {
    let status = rx
        .wait_for(|status| !matches!(status.state, LinkState::Disconnected))
        .await
        .map_err(|_| Error::Connection("connection state dropped".into()))?;

    match &status.state {
        LinkState::Exhausted(reason) => Err(Error::RetriesExhausted(reason.clone())),
        _ => Ok(()),
    }
}
