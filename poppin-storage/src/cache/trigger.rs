//! Background refresh trigger.
//!
//! A stale lookup publishes `{"city": <partition>}` to a delivery channel and
//! returns immediately; a [`super::RefreshConsumer`] on the other end runs
//! the clean sweep. Channel creation is idempotent on the collaborator side,
//! and [`ChannelGuard`] makes sure this process asks for it at most once.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use poppin_core::{PoppinResult, TriggerError};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, warn};

/// Result of asking for the delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Created,
    AlreadyExists,
}

/// At-least-once delivery of refresh requests to a background consumer.
#[async_trait]
pub trait BackgroundTrigger: Send + Sync {
    /// Make sure the delivery channel exists. "Already exists" is success.
    async fn ensure_channel(&self) -> PoppinResult<ChannelStatus>;

    /// Enqueue a refresh request for `partition`.
    async fn publish(&self, partition: &str) -> PoppinResult<()>;

    /// Channel name for logs.
    fn channel_name(&self) -> &str;
}

// ============================================================================
// MESSAGE
// ============================================================================

/// Wire shape of a refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshMessage {
    #[serde(default)]
    pub city: String,
}

impl RefreshMessage {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into() }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TriggerError> {
        serde_json::to_vec(self).map_err(|e| TriggerError::Encode {
            reason: e.to_string(),
        })
    }

    /// Decode a payload. `None` for undecodable payloads and blank cities.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(payload)
            .ok()
            .filter(|msg| !msg.city.trim().is_empty())
    }
}

// ============================================================================
// CHANNEL GUARD
// ============================================================================

/// Once-per-process guard around [`BackgroundTrigger::ensure_channel`].
///
/// Exactly one caller issues the creation call. Callers arriving while it is
/// in flight wait for it to finish before they publish. A failed creation is
/// not retried: publishing to a missing channel fails and is logged like any
/// other trigger error.
#[derive(Debug, Default)]
pub struct ChannelGuard {
    checked: OnceCell<()>,
}

impl ChannelGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the creation attempt has completed.
    pub fn is_checked(&self) -> bool {
        self.checked.initialized()
    }

    /// Attempt channel creation if no caller has yet. Never fails.
    pub async fn ensure(&self, trigger: &dyn BackgroundTrigger) {
        self.checked
            .get_or_init(|| async {
                match trigger.ensure_channel().await {
                    Ok(status) => {
                        debug!(channel = trigger.channel_name(), ?status, "Trigger channel ready")
                    }
                    Err(e) => warn!(
                        channel = trigger.channel_name(),
                        error = %e,
                        "Failed to create trigger channel"
                    ),
                }
            })
            .await;
    }
}

// ============================================================================
// IN-PROCESS TRIGGER
// ============================================================================

/// [`BackgroundTrigger`] over an in-process unbounded channel.
///
/// Payloads are JSON-encoded [`RefreshMessage`]s, the same bytes a durable
/// topic would carry.
#[derive(Debug)]
pub struct InProcessTrigger {
    topic: String,
    sender: mpsc::UnboundedSender<Vec<u8>>,
    created: AtomicBool,
}

impl InProcessTrigger {
    /// Create a trigger on `topic` and the receiver its consumer drains.
    pub fn channel(topic: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let trigger = Self {
            topic: topic.into(),
            sender,
            created: AtomicBool::new(false),
        };
        (trigger, receiver)
    }
}

#[async_trait]
impl BackgroundTrigger for InProcessTrigger {
    async fn ensure_channel(&self) -> PoppinResult<ChannelStatus> {
        if self.sender.is_closed() {
            return Err(TriggerError::ChannelCreation {
                channel: self.topic.clone(),
                reason: "receiver dropped".to_string(),
            }
            .into());
        }
        if self.created.swap(true, Ordering::AcqRel) {
            Ok(ChannelStatus::AlreadyExists)
        } else {
            Ok(ChannelStatus::Created)
        }
    }

    async fn publish(&self, partition: &str) -> PoppinResult<()> {
        let payload = RefreshMessage::new(partition).encode()?;
        self.sender
            .send(payload)
            .map_err(|_| TriggerError::ChannelClosed {
                channel: self.topic.clone(),
            })?;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.topic
    }
}
