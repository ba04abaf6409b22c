//! Application configuration. API credentials, paths, storage and limits.

use crate::domain::Limits;
use crate::domain::limits::{
    DEFAULT_MAX_ALIASES_PER_GROUP, DEFAULT_MAX_GROUPS_PER_CHAT, DEFAULT_MAX_MEMBERS_PER_GROUP,
};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "MENTIONS_BOT";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SESSION_PATH: &str = "./bot.session";

/// Where groups and members are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    /// Token from @BotFather. Read from MENTIONS_BOT_BOT_TOKEN.
    pub bot_token: Option<String>,
    /// Accept `/cmd@name` only for this name. Fetched from Telegram when unset.
    pub bot_username: Option<String>,
    pub data_dir: Option<String>,
    pub session_path: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,

    #[serde(default)]
    pub max_groups_per_chat: Option<usize>,
    #[serde(default)]
    pub max_aliases_per_group: Option<usize>,
    #[serde(default)]
    pub max_members_per_group: Option<usize>,
}

impl AppConfig {
    /// Environment (`MENTIONS_BOT_*`) plus an optional file named by `MENTIONS_BOT_CONFIG`.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG")) {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> &str {
        self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR)
    }

    pub fn session_path_or_default(&self) -> &str {
        self.session_path.as_deref().unwrap_or(DEFAULT_SESSION_PATH)
    }

    /// Cardinality limits; unset or zero values fall back to the defaults.
    pub fn limits(&self) -> Limits {
        let pick = |value: Option<usize>, default: usize| value.filter(|&n| n > 0).unwrap_or(default);
        Limits {
            max_groups_per_chat: pick(self.max_groups_per_chat, DEFAULT_MAX_GROUPS_PER_CHAT),
            max_aliases_per_group: pick(self.max_aliases_per_group, DEFAULT_MAX_ALIASES_PER_GROUP),
            max_members_per_group: pick(self.max_members_per_group, DEFAULT_MAX_MEMBERS_PER_GROUP),
        }
    }

    pub fn is_telegram_configured(&self) -> bool {
        self.api_id.is_some_and(|id| id != 0) && self.api_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}
