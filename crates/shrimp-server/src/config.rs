//! Server configuration

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration, optionally loaded from a YAML file
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Password that promotes a client to admin
    pub admin_password: String,
    /// Clients must send exactly this version with `REQUEST_USERNAME`
    pub protocol_version: String,
    /// Per-kilogram cost charged to every player
    pub player_expenses: i64,
    /// Fixed UTC offset used for chat timestamps
    pub chat_utc_offset_hours: i32,
    /// Reject catches outside the lobby's [min, max] range
    pub enforce_catch_range: bool,
    /// Lobby-to-table partitioning rules
    pub matchmaking: MatchmakingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_password: "detteerbra".into(),
            protocol_version: "1.7.6".into(),
            player_expenses: 5,
            chat_utc_offset_hours: 2,
            enforce_catch_range: false,
            matchmaking: MatchmakingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_password.is_empty() {
            bail!("admin_password must not be empty");
        }
        if self.protocol_version.is_empty() || self.protocol_version.contains(' ') {
            bail!("protocol_version must be a single non-empty token");
        }
        if !(-23..=23).contains(&self.chat_utc_offset_hours) {
            bail!(
                "chat_utc_offset_hours out of range: {}",
                self.chat_utc_offset_hours
            );
        }
        Ok(())
    }
}

/// How lobbies are cut into three-seat tables
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Refuse lobbies whose capacity is not a positive multiple of the table size
    pub require_full_tables: bool,
    /// What happens to players left over after partitioning
    pub remainder: RemainderPolicy,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            require_full_tables: true,
            remainder: RemainderPolicy::Requeue,
        }
    }
}

/// Fate of the players that do not fill a final table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Put them in a fresh lobby with the same name and settings
    #[default]
    Requeue,
    /// Release them back to the idle pool
    Reject,
}
