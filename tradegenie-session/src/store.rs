use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::warn;

use tradegenie_utils::env::env_opt;
use tradegenie_utils::parse::parse_duration_seconds;

use crate::model::conversation::ConversationRecord;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// In-progress conversations keyed by chat user id.
///
/// The map itself does no locking; whoever owns it must serialize access.
pub type ConversationStore = HashMap<u64, ConversationRecord>;

/// The bot's handle: one mutex around the whole store, shared by the message
/// handlers and the periodic janitor.
pub type SharedConversationStore = Arc<Mutex<ConversationStore>>;

pub fn shared_store() -> SharedConversationStore {
    Arc::new(Mutex::new(ConversationStore::new()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum age of a conversation, also the sweep period.
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Read `USER_DATA_CLEANUP_INTERVAL_SECONDS` (plain seconds or `1h`-style).
    pub fn from_env() -> Self {
        const KEY: &str = "USER_DATA_CLEANUP_INTERVAL_SECONDS";

        let Some(raw) = env_opt(KEY) else {
            return Self::default();
        };

        match parse_duration_seconds(&raw) {
            Some(seconds) => Self {
                cleanup_interval: Duration::from_secs(seconds),
            },
            None => {
                warn!(key = KEY, value = %raw, "invalid cleanup interval; using default");
                Self::default()
            }
        }
    }
}
