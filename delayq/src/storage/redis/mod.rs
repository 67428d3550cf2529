//! Redis store
//!
//! Wraps a single fred client. Reconnection and backoff are delegated to
//! fred's reconnect policy; this module translates the client's connection
//! state into [`ConnectionState`] transitions.

use crate::config::StoreConfig;
use crate::connection::{ConnectionState, LinkState};
use crate::storage::Store;
use crate::Result;
use async_trait::async_trait;
use fred::types::Server;
use fred::{interfaces::*, prelude::*};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Notify};
use tokio::time::MissedTickBehavior;

/// How often the link monitor re-reads the client state without an event
const LINK_RESYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Redis-backed store client
#[derive(Clone)]
pub struct RedisStore {
    client: RedisClient,
    connection: ConnectionState,
    resync: Arc<Notify>,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// Returns without waiting for the server. The state starts
    /// disconnected and turns connected once the first connection is up;
    /// until then the transport keeps retrying. Fails only on an invalid
    /// configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let client = RedisClient::new(
            config.to_fred_config(),
            None,
            None,
            Some(config.reconnect_policy()),
        );
        let connection = ConnectionState::new();
        let resync = Arc::new(Notify::new());

        // Subscribe before connecting so no event is missed
        let reconnect_rx = client.reconnect_rx();
        let error_rx = client.error_rx();

        tracing::info!("Connecting to Redis at {}", config.url());
        let connect_handle = client.connect();

        tokio::spawn(monitor_link(
            client.clone(),
            connection.clone(),
            reconnect_rx,
            error_rx,
            Arc::clone(&resync),
        ));

        // The connection task only returns once the client quits or fred
        // gives up for good.
        let state = connection.clone();
        tokio::spawn(async move {
            let reason = match connect_handle.await {
                Ok(Ok(())) => "connection closed".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!("Redis connection task ended: {}", reason);
            state.set_exhausted(reason);
        });

        Ok(Self {
            client,
            connection,
            resync,
        })
    }

    /// Create a store from a Redis URL
    pub async fn from_url(url: &str) -> Result<Self> {
        Self::connect(&StoreConfig::from_url(url)?).await
    }

    /// Ask the link monitor to re-read the client state after a failure
    fn observe<T>(&self, result: std::result::Result<T, RedisError>) -> Result<T> {
        if result.is_err() {
            self.resync.notify_one();
        }
        Ok(result?)
    }

    /// Ping Redis
    pub async fn ping(&self) -> Result<String> {
        let result = self.client.ping::<String>().await;
        self.observe(result)
    }

    /// Close the connection
    pub async fn quit(&self) -> Result<()> {
        self.client.quit().await?;
        Ok(())
    }
}

/// Align the published state with what the client reports
///
/// Events only prompt a re-read; the client's own view decides the state,
/// so a protocol error on a healthy link never marks it down.
fn sync_link(state: &ConnectionState, connected: bool) {
    if connected {
        state.set_connected();
    } else {
        state.set_disconnected();
    }
}

/// Single owner of the store's state transitions
async fn monitor_link(
    client: RedisClient,
    state: ConnectionState,
    mut reconnect_rx: broadcast::Receiver<Server>,
    mut error_rx: broadcast::Receiver<RedisError>,
    resync: Arc<Notify>,
) {
    let mut tick = tokio::time::interval(LINK_RESYNC_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let first_connect = client.wait_for_connect();
    tokio::pin!(first_connect);
    let mut awaiting_first = true;

    loop {
        tokio::select! {
            result = &mut first_connect, if awaiting_first => {
                awaiting_first = false;
                if let Err(e) = result {
                    tracing::warn!("Initial Redis connection failed: {}", e);
                }
            }
            event = reconnect_rx.recv() => match event {
                Ok(server) => tracing::info!("Reconnected to Redis server {}:{}", server.host, server.port),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            event = error_rx.recv() => match event {
                Ok(error) => tracing::warn!("Redis connection error: {}", error),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = resync.notified() => {}
            _ = tick.tick() => {}
        }

        if matches!(state.status().state, LinkState::Exhausted(_)) {
            break;
        }
        sync_link(&state, client.is_connected());
    }
    tracing::debug!("Redis link monitor stopped");
}

#[async_trait]
impl Store for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        let result = self.client.incr::<i64, _>(key).await;
        self.observe(result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<Option<String>> {
        let result = self
            .client
            .set::<Option<String>, _, _>(key, value, None, None, true)
            .await;
        self.observe(result)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.client.get::<Option<String>, _>(key).await;
        self.observe(result)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let result = self.client.del::<i64, _>(key).await;
        self.observe(result).map(|_| ())
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<()> {
        let values: Vec<(f64, RedisValue)> = vec![(score as f64, member.into())];
        let result = self
            .client
            .zadd::<i64, _, _>(key, None, None, false, false, values)
            .await;
        self.observe(result).map(|_| ())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let result = self.client.zrem::<i64, _, _>(key, member).await;
        self.observe(result).map(|_| ())
    }

    async fn zrange_by_score(&self, key: &str, max: i64, limit: usize) -> Result<Vec<String>> {
        let result = self
            .client
            .zrangebyscore::<Vec<String>, _, _, _>(key, i64::MIN, max, false, Some((0, limit as i64)))
            .await;
        self.observe(result)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let result = self.client.zcard::<u64, _>(key).await;
        self.observe(result)
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Keys;

    fn redis_config() -> StoreConfig {
        std::env::var("REDIS_URL")
            .ok()
            .and_then(|url| StoreConfig::from_url(&url).ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_protocol_error_keeps_link_up() {
        let state = ConnectionState::new();
        sync_link(&state, true);
        assert!(state.is_reachable());

        // An error event while the client still reports a live socket
        sync_link(&state, true);
        assert!(state.is_reachable());
    }

    #[test]
    fn test_link_follows_client() {
        let state = ConnectionState::new();
        sync_link(&state, false);
        assert!(!state.is_reachable());

        sync_link(&state, true);
        assert!(state.is_reachable());

        // A late error event re-reads the client and cannot undo a reconnect
        sync_link(&state, false);
        sync_link(&state, true);
        assert!(state.is_reachable());

        state.set_exhausted("gave up");
        sync_link(&state, true);
        assert!(matches!(state.status().state, LinkState::Exhausted(_)));
    }

    #[tokio::test]
    async fn test_connect_does_not_wait_for_server() {
        // Nothing listens on port 1
        let config = StoreConfig::default().with_host("127.0.0.1").with_port(1);
        let store = tokio::time::timeout(Duration::from_secs(2), RedisStore::connect(&config))
            .await
            .expect("connect blocked on an unreachable server")
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!store.connection().is_reachable());
        assert_eq!(store.connection().status().state, LinkState::Disconnected);
    }

    #[tokio::test]
    #[ignore = "Requires Redis server"]
    async fn test_redis_ping() {
        let store = RedisStore::connect(&redis_config()).await.unwrap();
        store.connection().wait_reachable().await.unwrap();
        assert!(store.connection().is_reachable());
        assert_eq!(store.ping().await.unwrap(), "PONG");
    }

    #[tokio::test]
    #[ignore = "Requires Redis server"]
    async fn test_redis_primitives() {
        let store = RedisStore::connect(&redis_config()).await.unwrap();
        store.connection().wait_reachable().await.unwrap();
        let topic = format!("store-test-{}", std::process::id());
        let counter = Keys::counter(&topic);
        let index = Keys::due_index(&topic);
        let payload = Keys::payload(&topic, "1");

        store.del(&counter).await.unwrap();
        assert_eq!(store.incr(&counter).await.unwrap(), 1);
        assert_eq!(store.incr(&counter).await.unwrap(), 2);

        assert_eq!(store.set(&payload, "a").await.unwrap(), None);
        assert_eq!(store.set(&payload, "b").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.get(&payload).await.unwrap(), Some("b".to_string()));

        store.zadd(&index, "2", 200).await.unwrap();
        store.zadd(&index, "1", 100).await.unwrap();
        assert_eq!(store.zrange_by_score(&index, 150, 10).await.unwrap(), vec!["1"]);
        assert_eq!(store.zrange_by_score(&index, 300, 1).await.unwrap(), vec!["1"]);
        assert_eq!(store.zcard(&index).await.unwrap(), 2);

        store.zrem(&index, "1").await.unwrap();
        store.zrem(&index, "1").await.unwrap();
        store.del(&payload).await.unwrap();
        store.del(&payload).await.unwrap();
        assert_eq!(store.get(&payload).await.unwrap(), None);

        store.del(&index).await.unwrap();
        store.del(&counter).await.unwrap();
    }
}
