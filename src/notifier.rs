//! Fire-and-forget messages for the UI layer.
//!
//! Messages go out on a broadcast channel. With no subscriber they are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::ChainId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsMessage {
    NewTokenDetected {
        token_identifier: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        seen_tx_ref: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        seen_description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_ignored: Option<bool>,
    },
    ProtocolCacheUpdates {
        protocol: String,
        chain: ChainId,
        processed: usize,
        total: usize,
    },
}

#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<WsMessage>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn notify(&self, message: WsMessage) {
        if self.sender.send(message).is_err() {
            debug!("No notification subscribers, message dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }
}
