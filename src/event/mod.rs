//! Engine-level events.
//!
//! One [`Event`] is produced per incoming line. Events are immutable
//! after the enrichment pass that attaches a resolved account name;
//! handlers receive clones and never mutate shared state through them.

mod parse;

pub use parse::{event_from_line, sanitize_line};

/// Closed enumeration of protocol occurrences the engine routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// PRIVMSG to a channel.
    ChannelMessage,
    /// PRIVMSG directly to the bot.
    PrivateMessage,
    /// NOTICE to any target.
    Notice,
    /// A user joined a channel.
    Join,
    /// A user left a channel.
    Part,
    /// A user disconnected.
    Quit,
    /// A user changed nickname; `aux` carries the new nick.
    Nick,
    /// A user was kicked; `target` is the victim.
    Kick,
    /// Channel or user mode change.
    Mode,
    /// Topic change.
    Topic,
    /// Invitation to a channel.
    Invite,
    /// Server keepalive probe.
    Ping,
    /// Keepalive response.
    Pong,
    /// account-notify: sender logged in or out; `aux` is the account
    /// name or `*`.
    Account,
    /// `001` - registration completed.
    Welcome,
    /// `433` - nickname already in use; `aux` is the rejected nick.
    NickInUse,
    /// `330` - WHOIS account line; `target` is the queried nick,
    /// `aux` the account.
    WhoisAccountReply,
    /// `318` - end of WHOIS; `target` is the queried nick.
    EndOfWhois,
    /// `421` - unknown command; `aux` is the echoed command word.
    UnknownCommandReply,
    /// `ERROR` from the server; the connection is about to drop.
    ServerError,
    /// Any other numeric reply; `num` is always set.
    Numeric,
    /// Anything unrecognized.
    Unknown,
}

/// Who sent an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Sender nickname (empty for server-originated events).
    pub nickname: String,
    /// Ident/username part of the mask.
    pub ident: String,
    /// Host part of the mask.
    pub address: String,
    /// Services account, once resolved.
    pub account: Option<String>,
}

impl Identity {
    /// Full `nick!user@host` mask with `*` placeholders.
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            if self.nickname.is_empty() { "*" } else { &self.nickname },
            if self.ident.is_empty() { "*" } else { &self.ident },
            if self.address.is_empty() { "*" } else { &self.address },
        )
    }
}

/// Immutable record of one protocol occurrence.
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// What happened.
    pub kind: EventType,
    /// Who caused it.
    pub sender: Identity,
    /// Primary target (recipient nick, kicked user, queried nick, ...).
    pub target: String,
    /// Channel context, when the event happened in one.
    pub channel: Option<String>,
    /// Free-text content (message body, quit reason, topic, ...).
    pub content: String,
    /// Secondary string slot (account names, new nicks, echoed words).
    pub aux: String,
    /// Numeric reply code, for numeric events.
    pub num: Option<u16>,
    /// The raw line as received.
    pub raw: String,
    /// UNIX timestamp of receipt.
    pub time: i64,
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Unknown
    }
}
