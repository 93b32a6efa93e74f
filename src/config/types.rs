//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server connection settings.
    pub server: ServerConfig,
    /// Bot identity and authorization lists.
    #[serde(default)]
    pub bot: BotConfig,
    /// Outbound chat throttle.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// WHOIS lookup behavior.
    #[serde(default)]
    pub whois: WhoisConfig,
    /// Session loop and reconnect behavior.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server hostname or address.
    pub host: String,
    /// Server port (default: 6667).
    #[serde(default = "defaults::default_port")]
    pub port: u16,
    /// Connection password (PASS), if the server requires one.
    pub password: Option<String>,
    /// Nickname to register with.
    pub nickname: String,
    /// Ident/username (USER), defaults to the nickname when empty.
    #[serde(default)]
    pub username: String,
    /// Realname (GECOS) field.
    #[serde(default = "defaults::default_realname")]
    pub realname: String,
}

/// Bot identity, command prefix, and authorization lists.
///
/// The four list fields hold services account names, or `nick!user@host`
/// wildcard masks which only take effect when the engine has degraded to
/// hostmask-only authorization.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Command prefix for `prefixed` descriptors (e.g. `"!"`).
    #[serde(default = "defaults::default_prefix")]
    pub prefix: String,
    /// When the prefix does not match, also accept commands addressed
    /// to the bot by nickname (`wintermute: cmd ...`).
    #[serde(default = "defaults::default_true")]
    pub prefix_fallback_to_nick: bool,
    /// The bot's primary operating channels.
    #[serde(default)]
    pub home_channels: Vec<String>,
    /// Accounts (or masks) with admin privileges.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Accounts (or masks) with operator privileges.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Accounts (or masks) on the whitelist.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Accounts (or masks) ignored unconditionally.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: defaults::default_prefix(),
            prefix_fallback_to_nick: true,
            home_channels: Vec::new(),
            admins: Vec::new(),
            operators: Vec::new(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// Leaky-bucket settings for the outbound chat throttle.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Bucket drain rate in lines per second.
    #[serde(default = "defaults::default_chat_rate")]
    pub rate: f64,
    /// Bucket ceiling; sends block while the level is at or above this.
    #[serde(default = "defaults::default_chat_burst")]
    pub burst: f64,
    /// Cost added to the bucket per line sent.
    #[serde(default = "defaults::default_increment")]
    pub increment: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate: defaults::default_chat_rate(),
            burst: defaults::default_chat_burst(),
            increment: defaults::default_increment(),
        }
    }
}

/// WHOIS lookup and deferral settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WhoisConfig {
    /// Minimum seconds between WHOIS attempts for the same sender.
    #[serde(default = "defaults::default_retry_window")]
    pub retry_window_secs: u64,
    /// WHOIS bucket drain rate (requests per second). Servers rate
    /// limit WHOIS much tighter than chat, hence the separate bucket.
    #[serde(default = "defaults::default_whois_rate")]
    pub rate: f64,
    /// WHOIS bucket ceiling.
    #[serde(default = "defaults::default_whois_burst")]
    pub burst: f64,
    /// Consecutive `421 WHOIS` replies before degrading permanently to
    /// hostmask-only authorization for this connection.
    #[serde(default = "defaults::default_max_unknown_command")]
    pub max_unknown_command: u8,
}

impl Default for WhoisConfig {
    fn default() -> Self {
        Self {
            retry_window_secs: defaults::default_retry_window(),
            rate: defaults::default_whois_rate(),
            burst: defaults::default_whois_burst(),
            max_unknown_command: defaults::default_max_unknown_command(),
        }
    }
}

/// Session loop and reconnect behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Seconds to wait before reconnecting after a dropped session.
    #[serde(default = "defaults::default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,
    /// Scheduler check cadence in milliseconds. The supervisor checks
    /// sooner when a newly scheduled task is due before the next tick.
    #[serde(default = "defaults::default_tick_millis")]
    pub tick_millis: u64,
    /// Seconds of read silence before the connection is considered dead.
    #[serde(default = "defaults::default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: defaults::default_reconnect_backoff(),
            tick_millis: defaults::default_tick_millis(),
            read_timeout_secs: defaults::default_read_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            host = "irc.example.net"
            nickname = "wm"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 6667);
        assert_eq!(cfg.bot.prefix, "!");
        assert!(cfg.bot.prefix_fallback_to_nick);
        assert_eq!(cfg.whois.max_unknown_command, 3);
        assert!(cfg.throttle.rate > 0.0);
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wintermute.toml");
        std::fs::write(
            &path,
            r##"
            [server]
            host = "irc.example.net"
            nickname = "wm"

            [bot]
            home_channels = ["#straylight"]
            "##,
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.bot.home_channels, vec!["#straylight"]);
    }
}
