//! WHOIS-based account resolution and deferred dispatch.
//!
//! A handler that needs a privilege check against a sender with no
//! resolved account does not fail outright: the invocation is parked
//! here and a WHOIS for the sender goes out, gated by its own leaky
//! bucket because servers police WHOIS far harder than chat. When the
//! reply lands the parked invocations replay through the privilege
//! check with the account the server vouched for.
//!
//! At most one lookup is in flight at a time. Servers that answer
//! WHOIS with `421 Unknown command` too many times in a row put the
//! tracker into degraded mode for the rest of the connection, after
//! which authorization falls back to hostmask matching.

use crate::config::WhoisConfig;
use crate::engine::throttle::LeakyBucket;
use crate::event::Event;
use std::collections::{HashMap, VecDeque};
use wintermute_proto::irc_to_lower;

/// Seconds an in-flight lookup may go unanswered before it is written
/// off (the nick may have vanished between queue and send).
const LOOKUP_TIMEOUT_SECS: i64 = 30;

/// One parked handler invocation awaiting account resolution.
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    /// Index of the plugin to invoke.
    pub plugin: usize,
    /// Descriptor index within that plugin.
    pub spec_index: usize,
    /// The event, already trimmed to the handler's argument form.
    pub event: Event,
}

/// Outcome of a finished (or failed) lookup.
#[derive(Debug)]
pub struct Resolved {
    /// The queried nickname as originally seen.
    pub nick: String,
    /// Account the server vouched for; `None` for unregistered nicks
    /// and for failed lookups.
    pub account: Option<String>,
    /// Invocations parked on this nick.
    pub replays: Vec<ReplayEntry>,
    /// True when the lookup never produced an answer (421 or timeout).
    pub failed: bool,
}

#[derive(Debug)]
struct PendingLookup {
    /// Folded nick, for matching replies.
    key: String,
    /// Display form, echoed back in [`Resolved`].
    display: String,
    started_at: i64,
    account: Option<String>,
}

/// State machine for the WHOIS pipeline.
#[derive(Debug)]
pub struct WhoisTracker {
    retry_window: i64,
    max_unknown: u8,
    bucket: LeakyBucket,
    in_flight: Option<PendingLookup>,
    /// Display nicks waiting for their lookup, at most one entry each.
    queue: VecDeque<String>,
    replays: HashMap<String, Vec<ReplayEntry>>,
    last_attempt: HashMap<String, i64>,
    unknown_run: u8,
    degraded: bool,
}

impl WhoisTracker {
    pub fn new(cfg: &WhoisConfig) -> Self {
        Self {
            retry_window: cfg.retry_window_secs as i64,
            max_unknown: cfg.max_unknown_command,
            bucket: LeakyBucket::new(cfg.rate, cfg.burst, 1.0),
            in_flight: None,
            queue: VecDeque::new(),
            replays: HashMap::new(),
            last_attempt: HashMap::new(),
            unknown_run: 0,
            degraded: false,
        }
    }

    /// Whether account lookups are off for this connection.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// Park an invocation until `nick`'s account resolves.
    ///
    /// Returns `false` when the nick was looked up within the retry
    /// window; the caller should then treat the sender as having no
    /// account rather than park anything.
    pub fn defer(&mut self, nick: &str, entry: ReplayEntry, now: i64) -> bool {
        if self.degraded {
            return false;
        }
        let key = irc_to_lower(nick);
        let queued = self.queue.iter().any(|n| irc_to_lower(n) == key)
            || self.in_flight.as_ref().is_some_and(|p| p.key == key);
        if !queued {
            if let Some(&at) = self.last_attempt.get(&key) {
                if now - at < self.retry_window {
                    return false;
                }
            }
            self.queue.push_back(nick.to_string());
        }
        self.replays.entry(key).or_default().push(entry);
        true
    }

    /// Produce the next `WHOIS` line to send, if one is due and the
    /// bucket allows it.
    pub fn pump(&mut self, now: i64) -> Option<String> {
        if self.degraded || self.in_flight.is_some() {
            return None;
        }
        let display = self.queue.front()?.clone();
        if self.bucket.try_acquire(now as f64).is_err() {
            return None;
        }
        self.queue.pop_front();
        let key = irc_to_lower(&display);
        self.last_attempt.insert(key.clone(), now);
        self.in_flight = Some(PendingLookup {
            key,
            display: display.clone(),
            started_at: now,
            account: None,
        });
        Some(format!("WHOIS {display}"))
    }

    /// Record a `330` account line for the in-flight lookup.
    pub fn note_account(&mut self, nick: &str, account: &str) {
        let key = irc_to_lower(nick);
        if let Some(pending) = self.in_flight.as_mut() {
            if pending.key == key {
                pending.account = Some(account.to_string());
            }
        }
    }

    /// Close the in-flight lookup on `318`. A lookup that saw no `330`
    /// resolves to an unregistered nick, which is a positive answer.
    pub fn complete(&mut self, nick: &str) -> Option<Resolved> {
        let key = irc_to_lower(nick);
        if self.in_flight.as_ref().is_none_or(|p| p.key != key) {
            return None;
        }
        let pending = self.in_flight.take()?;
        self.unknown_run = 0;
        Some(Resolved {
            replays: self.replays.remove(&pending.key).unwrap_or_default(),
            nick: pending.display,
            account: pending.account,
            failed: false,
        })
    }

    /// Handle `421` echoing a WHOIS we sent. Enough of these in a row
    /// and the tracker degrades for the rest of the connection.
    pub fn unknown_command(&mut self, echoed: &str) -> Option<Resolved> {
        if !echoed.eq_ignore_ascii_case("WHOIS") {
            return None;
        }
        let pending = self.in_flight.take()?;
        self.unknown_run = self.unknown_run.saturating_add(1);
        if self.unknown_run >= self.max_unknown {
            self.degraded = true;
            tracing::warn!(
                run = self.unknown_run,
                "server rejects WHOIS, degrading to hostmask authorization"
            );
        }
        Some(Resolved {
            replays: self.replays.remove(&pending.key).unwrap_or_default(),
            nick: pending.display,
            account: None,
            failed: true,
        })
    }

    /// Write off an in-flight lookup that has gone unanswered too long.
    pub fn expire(&mut self, now: i64) -> Option<Resolved> {
        let stale = self
            .in_flight
            .as_ref()
            .is_some_and(|p| now - p.started_at >= LOOKUP_TIMEOUT_SECS);
        if !stale {
            return None;
        }
        let pending = self.in_flight.take()?;
        Some(Resolved {
            replays: self.replays.remove(&pending.key).unwrap_or_default(),
            nick: pending.display,
            account: None,
            failed: true,
        })
    }

    /// Follow a nick change so parked work lands on the new name.
    pub fn rename(&mut self, old: &str, new: &str) {
        let old_key = irc_to_lower(old);
        let new_key = irc_to_lower(new);
        if let Some(entries) = self.replays.remove(&old_key) {
            self.replays.entry(new_key.clone()).or_default().extend(entries);
        }
        for queued in self.queue.iter_mut() {
            if irc_to_lower(queued) == old_key {
                *queued = new.to_string();
            }
        }
        if let Some(pending) = self.in_flight.as_mut() {
            if pending.key == old_key {
                // The reply will still name the old nick or none at
                // all; expiry covers the latter.
                pending.key = new_key;
                pending.display = new.to_string();
            }
        }
    }

    /// Drop everything parked on a nick that left the network.
    pub fn forget(&mut self, nick: &str) {
        let key = irc_to_lower(nick);
        self.replays.remove(&key);
        self.queue.retain(|n| irc_to_lower(n) != key);
    }

    /// Per-connection reset.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.queue.clear();
        self.replays.clear();
        self.last_attempt.clear();
        self.unknown_run = 0;
        self.degraded = false;
        self.bucket.reset();
    }
}
