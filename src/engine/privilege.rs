//! Sender classification and privilege checks.
//!
//! Authorization rests on services accounts: the configured lists name
//! account names, and a sender is classified by the account the server
//! vouches for. When a network cannot vouch for accounts at all the
//! engine degrades to hostmask matching, where only list entries that
//! are masks (contain `!` or `@`) take effect.

use crate::config::BotConfig;
use wintermute_proto::{irc_eq, matches_hostmask};

/// Requirement a handler places on its senders, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivilegeLevel {
    /// No check at all; fires even for blacklisted senders.
    Ignore,
    /// Any non-blacklisted sender.
    Anyone,
    /// Any sender with a services account.
    Registered,
    /// Whitelisted accounts and above.
    Whitelist,
    /// Operator accounts and above.
    Operator,
    /// Admin accounts only.
    Admin,
}

/// What the engine concluded about one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Explicitly unwelcome; satisfies nothing above `Ignore`.
    Blacklist,
    /// No account, or nothing known about the account.
    Anyone,
    /// Has an account not named in any list.
    Registered,
    Whitelist,
    Operator,
    Admin,
}

impl Classification {
    fn rank(self) -> u8 {
        match self {
            Self::Blacklist => 0,
            Self::Anyone => 1,
            Self::Registered => 2,
            Self::Whitelist => 3,
            Self::Operator => 4,
            Self::Admin => 5,
        }
    }

    /// Whether this classification meets `required`.
    pub fn satisfies(self, required: PrivilegeLevel) -> bool {
        match required {
            PrivilegeLevel::Ignore => true,
            _ if self == Self::Blacklist => false,
            PrivilegeLevel::Anyone => true,
            PrivilegeLevel::Registered => self.rank() >= 2,
            PrivilegeLevel::Whitelist => self.rank() >= 3,
            PrivilegeLevel::Operator => self.rank() >= 4,
            PrivilegeLevel::Admin => self.rank() >= 5,
        }
    }
}

fn list_has_account(list: &[String], account: &str) -> bool {
    list.iter()
        .filter(|e| !e.contains('!') && !e.contains('@'))
        .any(|e| irc_eq(e, account))
}

fn list_has_mask(list: &[String], mask: &str) -> bool {
    list.iter()
        .filter(|e| e.contains('!') || e.contains('@'))
        .any(|e| matches_hostmask(e, mask))
}

/// Classify a sender by resolved services account. Blacklist wins over
/// every other list.
pub fn classify_account(cfg: &BotConfig, account: &str) -> Classification {
    if list_has_account(&cfg.blacklist, account) {
        Classification::Blacklist
    } else if list_has_account(&cfg.admins, account) {
        Classification::Admin
    } else if list_has_account(&cfg.operators, account) {
        Classification::Operator
    } else if list_has_account(&cfg.whitelist, account) {
        Classification::Whitelist
    } else {
        Classification::Registered
    }
}

/// Classify a sender by `nick!user@host` mask, for degraded operation.
pub fn classify_mask(cfg: &BotConfig, mask: &str) -> Classification {
    if list_has_mask(&cfg.blacklist, mask) {
        Classification::Blacklist
    } else if list_has_mask(&cfg.admins, mask) {
        Classification::Admin
    } else if list_has_mask(&cfg.operators, mask) {
        Classification::Operator
    } else if list_has_mask(&cfg.whitelist, mask) {
        Classification::Whitelist
    } else {
        // A mask proves presence, not registration.
        Classification::Anyone
    }
}
