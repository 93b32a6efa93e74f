//! Shared engine state and the context handed to plugin handlers.
//!
//! Everything lives on the one engine task, so there is no locking
//! here: a handler gets `&mut CoreState` through [`PluginCtx`] for the
//! duration of its invocation and gives it back when it returns or
//! suspends.

use crate::config::Config;
use crate::engine::bus::BusMessage;
use crate::engine::scheduler::{Scheduler, Token};
use crate::event::{Event, EventType};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use wintermute_proto::{irc_eq, irc_to_lower};

/// One line queued for the throttled outbound path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Full protocol line, without line terminator.
    pub line: String,
    /// Quiet lines are logged at debug instead of info.
    pub quiet: bool,
}

/// What is known about a nickname on the current connection.
#[derive(Debug, Clone)]
pub struct UserEntry {
    /// Resolved services account; `None` means confirmed unregistered.
    pub account: Option<String>,
    /// When the entry was last confirmed (UNIX seconds).
    pub checked_at: i64,
}

/// Nickname to account cache, keyed under rfc1459 folding.
///
/// Entries are written from WHOIS results and `account-notify` lines
/// and invalidated when the nickname quits or changes. A `None`
/// account is a positive result too: it keeps the retry window from
/// re-asking WHOIS about a nick the server just said has no account.
#[derive(Debug, Default)]
pub struct UserCache {
    map: HashMap<String, UserEntry>,
}

impl UserCache {
    pub fn get(&self, nick: &str) -> Option<&UserEntry> {
        self.map.get(&irc_to_lower(nick))
    }

    pub fn set(&mut self, nick: &str, account: Option<String>, now: i64) {
        self.map.insert(
            irc_to_lower(nick),
            UserEntry {
                account,
                checked_at: now,
            },
        );
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(entry) = self.map.remove(&irc_to_lower(old)) {
            self.map.insert(irc_to_lower(new), entry);
        }
    }

    pub fn forget(&mut self, nick: &str) {
        self.map.remove(&irc_to_lower(nick));
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Mutable state shared by the engine and every handler invocation.
#[derive(Debug)]
pub struct CoreState {
    /// Immutable configuration.
    pub config: Arc<Config>,
    /// The nickname the bot currently holds (may differ from the
    /// configured one after a 433 mutation).
    pub nickname: String,
    /// Whether registration has completed on this connection.
    pub registered: bool,
    /// Nickname to account cache.
    pub users: UserCache,
    /// Awaits and delayed tasks.
    pub sched: Scheduler,
    /// Lines waiting behind the chat throttle.
    pub outbound: VecDeque<Outbound>,
    /// Lines that bypass the throttle (PONG, registration, QUIT).
    pub immediate: VecDeque<String>,
    /// Broadcasts awaiting delivery.
    pub bus_queue: VecDeque<BusMessage>,
    /// Set by a handler to end the process after the queues drain.
    pub quit_requested: bool,
    /// Set by a handler to cycle the connection.
    pub reconnect_requested: bool,
    /// Current event time (UNIX seconds), refreshed per line and tick.
    pub now: i64,
    next_token: Token,
}

impl CoreState {
    pub fn new(config: Arc<Config>) -> Self {
        let nickname = config.server.nickname.clone();
        Self {
            config,
            nickname,
            registered: false,
            users: UserCache::default(),
            sched: Scheduler::new(),
            outbound: VecDeque::new(),
            immediate: VecDeque::new(),
            bus_queue: VecDeque::new(),
            quit_requested: false,
            reconnect_requested: false,
            now: 0,
            next_token: 1,
        }
    }

    fn fresh_token(&mut self) -> Token {
        let t = self.next_token;
        self.next_token += 1;
        t
    }

    /// Whether `channel` is one of the configured home channels.
    pub fn is_home(&self, channel: &str) -> bool {
        self.config
            .bot
            .home_channels
            .iter()
            .any(|c| irc_eq(c, channel))
    }
}

/// The capability surface a plugin sees while it runs.
///
/// `plugin` is the calling plugin's index; the scheduler files every
/// await and delay under it so resumptions land back in the right
/// plugin.
pub struct PluginCtx<'a> {
    pub core: &'a mut CoreState,
    pub plugin: usize,
}

impl PluginCtx<'_> {
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn nickname(&self) -> &str {
        &self.core.nickname
    }

    pub fn now(&self) -> i64 {
        self.core.now
    }

    pub fn is_home(&self, channel: &str) -> bool {
        self.core.is_home(channel)
    }

    /// Queue a raw line on the throttled path.
    pub fn send(&mut self, line: impl Into<String>) {
        self.core.outbound.push_back(Outbound {
            line: line.into(),
            quiet: false,
        });
    }

    /// Like [`send`](Self::send) but logged at debug only.
    pub fn send_quiet(&mut self, line: impl Into<String>) {
        self.core.outbound.push_back(Outbound {
            line: line.into(),
            quiet: true,
        });
    }

    /// Queue a line that bypasses the chat throttle entirely.
    pub fn send_immediate(&mut self, line: impl Into<String>) {
        self.core.immediate.push_back(line.into());
    }

    /// PRIVMSG `text` to a nick or channel.
    pub fn msg(&mut self, target: &str, text: &str) {
        self.send(format!("PRIVMSG {target} :{text}"));
    }

    /// NOTICE `text` to a nick or channel.
    pub fn notice(&mut self, target: &str, text: &str) {
        self.send(format!("NOTICE {target} :{text}"));
    }

    /// Answer where the event came from: the channel for channel
    /// events, the sender's nick otherwise.
    pub fn reply(&mut self, event: &Event, text: &str) {
        match &event.channel {
            Some(chan) => self.msg(chan, text),
            None => self.msg(&event.sender.nickname, text),
        }
    }

    /// Suspend against future events of the given types. The returned
    /// token is handed back through `Plugin::resume` on every match
    /// until the resumption returns `Done` or the token is cancelled.
    pub fn await_events(&mut self, kinds: &[EventType]) -> Token {
        let token = self.core.fresh_token();
        self.core.sched.register_await(kinds, self.plugin, token);
        token
    }

    /// Schedule a one-shot resumption `secs` from now.
    pub fn delay(&mut self, secs: i64) -> Token {
        let token = self.core.fresh_token();
        let fire_at = self.core.now + secs;
        self.core.sched.schedule(self.plugin, token, fire_at);
        token
    }

    /// Cancel an await or delay. Unknown tokens are a no-op.
    pub fn cancel(&mut self, token: Token) {
        self.core.sched.cancel(token);
    }

    /// Post a broadcast to every other plugin.
    pub fn broadcast(&mut self, header: impl Into<String>, payload: serde_json::Value) {
        self.core.bus_queue.push_back(BusMessage {
            from: self.plugin,
            header: header.into(),
            payload,
        });
    }

    /// Ask the supervisor to shut the process down cleanly.
    pub fn request_quit(&mut self) {
        self.core.quit_requested = true;
    }

    /// Ask the supervisor to drop and re-establish the connection.
    pub fn request_reconnect(&mut self) {
        self.core.reconnect_requested = true;
    }
}
