//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

pub fn default_port() -> u16 {
    6667
}

pub fn default_realname() -> String {
    "wintermute".to_string()
}

pub fn default_prefix() -> String {
    "!".to_string()
}

// =============================================================================
// Throttle defaults
// =============================================================================

pub fn default_chat_rate() -> f64 {
    1.2
}

pub fn default_chat_burst() -> f64 {
    5.0
}

pub fn default_increment() -> f64 {
    1.0
}

// =============================================================================
// WHOIS defaults
// =============================================================================

pub fn default_retry_window() -> u64 {
    300
}

pub fn default_whois_rate() -> f64 {
    0.2
}

pub fn default_whois_burst() -> f64 {
    2.0
}

pub fn default_max_unknown_command() -> u8 {
    3
}

// =============================================================================
// Session defaults
// =============================================================================

pub fn default_reconnect_backoff() -> u64 {
    30
}

pub fn default_tick_millis() -> u64 {
    500
}

pub fn default_read_timeout() -> u64 {
    300
}
