//! Cross-process invalidation. Every message on the wire is, in the common
//! case, just the evicted key: the bus's only job is to call
//! [`LocalTier::evict`] on every other instance subscribed to the channel.
//!
//! A `Weak` reference to the local tier means a torn-down engine doesn't
//! keep the subscriber task, or the task's connection, alive.

use crate::local_tier::LocalTier;
use redis::aio::PubSub;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct InvalidationBusConfig {
    pub channel: String,
    pub reconnect_backoff: Duration,
}

impl Default for InvalidationBusConfig {
    fn default() -> Self {
        Self {
            channel: "cache:invalidate".to_string(),
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

/// Subscribes to a key-eviction channel and applies each message to a local
/// tier. One instance per engine; `start` is idempotent to call once.
pub struct InvalidationBus {
    local_tier: Weak<dyn LocalTier>,
    config: InvalidationBusConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl InvalidationBus {
    pub fn new(local_tier: Weak<dyn LocalTier>, config: InvalidationBusConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            local_tier,
            config,
            shutdown_tx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Subscribes over a live Redis connection and applies every received
    /// key to the local tier until `shutdown` is called or the local tier
    /// is dropped. Reconnects with a fixed backoff on connection loss.
    pub fn start_over_redis(&self, redis_url: String) {
        let local_tier = self.local_tier.clone();
        let channel = self.config.channel.clone();
        let backoff = self.config.reconnect_backoff;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                if local_tier.upgrade().is_none() {
                    debug!("local tier dropped, stopping invalidation subscriber");
                    return;
                }
                let client = match redis::Client::open(redis_url.as_str()) {
                    Ok(c) => c,
                    Err(err) => {
                        error!(error = %err, "invalid redis url for invalidation subscriber");
                        return;
                    }
                };
                tokio::select! {
                    result = run_redis_subscriber_loop(&client, &channel, &local_tier) => {
                        if let Err(err) = result {
                            warn!(error = %err, "invalidation subscriber lost connection, retrying");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("invalidation subscriber shutting down");
                        return;
                    }
                }
                if local_tier.upgrade().is_none() {
                    return;
                }
                tokio::time::sleep(jittered(backoff)).await;
            }
        });
    }

    /// Subscribes over an in-process broadcast channel, for
    /// [`crate::shared_tier::InMemorySharedTier`].
    pub fn start_over_broadcast(&self, mut rx: broadcast::Receiver<String>) {
        let local_tier = self.local_tier.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => {
                        match message {
                            Ok(key) => {
                                if let Some(tier) = local_tier.upgrade() {
                                    tier.evict(&key).await;
                                } else {
                                    return;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "invalidation subscriber lagged, some evictions missed");
                            }
                            Err(broadcast::error::RecvError::Closed) => return,
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        });
    }
}

/// Adds up to 20% jitter to a reconnect delay so a Redis outage doesn't send
/// every instance's subscriber back in lockstep.
fn jittered(backoff: Duration) -> Duration {
    let extra = backoff.mul_f64(rand::random::<f64>() * 0.2);
    backoff + extra
}

async fn run_redis_subscriber_loop(
    client: &redis::Client,
    channel: &str,
    local_tier: &Weak<dyn LocalTier>,
) -> anyhow::Result<()> {
    let mut pubsub: PubSub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    let mut stream = pubsub.on_message();
    use futures_util::StreamExt;
    while let Some(message) = stream.next().await {
        let key: String = message.get_payload()?;
        let Some(tier) = local_tier.upgrade() else {
            return Ok(());
        };
        debug!(key = %key, "applying remote invalidation");
        tier.evict(&key).await;
    }
    Ok(())
}
