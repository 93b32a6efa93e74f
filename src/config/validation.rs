//! Startup sanity checks for the loaded configuration.

use super::types::{Config, ConfigError};

impl Config {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.server.nickname.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.nickname must not be empty".into(),
            ));
        }
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::Invalid("bot.prefix must not be empty".into()));
        }
        for chan in &self.bot.home_channels {
            if !chan.starts_with('#') && !chan.starts_with('&') {
                return Err(ConfigError::Invalid(format!(
                    "home channel {chan:?} must start with '#' or '&'"
                )));
            }
        }
        if self.throttle.rate <= 0.0 || self.throttle.burst <= 0.0 {
            return Err(ConfigError::Invalid(
                "throttle.rate and throttle.burst must be positive".into(),
            ));
        }
        if self.whois.rate <= 0.0 || self.whois.burst <= 0.0 {
            return Err(ConfigError::Invalid(
                "whois.rate and whois.burst must be positive".into(),
            ));
        }
        if self.whois.max_unknown_command == 0 {
            return Err(ConfigError::Invalid(
                "whois.max_unknown_command must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    fn base() -> Config {
        toml::from_str(
            r#"
            [server]
            host = "irc.example.net"
            nickname = "wm"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_sane_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_bad_home_channel() {
        let mut cfg = base();
        cfg.bot.home_channels.push("straylight".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_rate() {
        let mut cfg = base();
        cfg.throttle.rate = 0.0;
        assert!(cfg.validate().is_err());
    }
}
