//! Configuration loading and management.
//!
//! Split into logical submodules:
//! - [`types`]: config struct definitions and TOML loading
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup sanity checks

mod defaults;
mod types;
mod validation;

pub use types::{
    BotConfig, Config, ConfigError, ServerConfig, SessionConfig, ThrottleConfig, WhoisConfig,
};
