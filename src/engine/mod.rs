//! The bot engine: one task that owns all state.
//!
//! The supervisor feeds lines and ticks in; the engine parses, runs
//! bookkeeping, delivers awaited events, walks the handler table, and
//! leaves whatever should go out on the [`CoreState`] queues. Nothing
//! in here touches the socket and nothing is locked: handlers run to
//! completion (or suspend through the scheduler) one at a time.

pub mod bus;
pub mod context;
pub mod privilege;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod throttle;
pub mod whois;

use crate::config::Config;
use crate::error::HandlerError;
use crate::event::{event_from_line, sanitize_line, Event, EventType};
use crate::plugins::{ChannelPolicy, HandlerSpec, Plugin, PrefixPolicy};
use context::{CoreState, Outbound, PluginCtx};
use privilege::{classify_account, classify_mask, Classification, PrivilegeLevel};
use registry::Registry;
use scheduler::Continuation;
use std::sync::Arc;
use whois::{ReplayEntry, Resolved, WhoisTracker};

/// Outcome of the privilege gate for one handler.
enum Gate {
    Allow,
    Deny,
    /// Park the invocation until the sender's account resolves.
    Defer,
}

pub struct Engine {
    pub core: CoreState,
    plugins: Vec<Box<dyn Plugin>>,
    registry: Registry,
    whois: WhoisTracker,
}

impl Engine {
    pub fn new(config: Arc<Config>, plugins: Vec<Box<dyn Plugin>>) -> Self {
        let registry = Registry::build(&plugins);
        let whois = WhoisTracker::new(&config.whois);
        tracing::debug!(
            plugins = plugins.len(),
            handlers = registry.len(),
            "handler table built"
        );
        Self {
            core: CoreState::new(config),
            plugins,
            registry,
            whois,
        }
    }

    /// Parse and route one raw line. Unparseable lines get one retry
    /// against a sanitized copy, then are dropped.
    pub async fn handle_line(&mut self, line: &str, now: i64) {
        self.core.now = now;
        let event = match event_from_line(line, now) {
            Ok(ev) => ev,
            Err(err) => {
                let cleaned = sanitize_line(line);
                match event_from_line(&cleaned, now) {
                    Ok(ev) => ev,
                    Err(_) => {
                        tracing::debug!(%err, line, "dropping unparseable line");
                        return;
                    }
                }
            }
        };
        self.route(event).await;
    }

    /// Route one event: bookkeeping, account enrichment, awaited
    /// resumptions, then the phase-ordered handler walk.
    pub async fn route(&mut self, mut event: Event) {
        self.bookkeep(&event).await;

        if event.sender.account.is_none() && !event.sender.nickname.is_empty() {
            if let Some(entry) = self.core.users.get(&event.sender.nickname) {
                event.sender.account = entry.account.clone();
            }
        }

        for entry in self.core.sched.awaiting(event.kind) {
            let cont = {
                let mut ctx = PluginCtx {
                    core: &mut self.core,
                    plugin: entry.plugin,
                };
                self.plugins[entry.plugin]
                    .resume(&mut ctx, entry.token, Some(&event))
                    .await
            };
            if cont == Continuation::Done {
                self.core.sched.cancel(entry.token);
            }
        }

        for i in 0..self.registry.len() {
            let plan = {
                let h = self.registry.get(i);
                plan_invocation(&h.spec, &self.core, self.whois.degraded(), &event)
                    .map(|(gate, inv)| {
                        (h.plugin, h.spec_index, h.spec.name, h.spec.chainable, h.spec.level, gate, inv)
                    })
            };
            let Some((plugin, spec_index, name, chainable, level, gate, invocation)) = plan else {
                continue;
            };
            match gate {
                Gate::Deny => {}
                Gate::Defer => {
                    let parked = self.whois.defer(
                        &event.sender.nickname,
                        ReplayEntry {
                            plugin,
                            spec_index,
                            event: invocation.clone(),
                        },
                        self.core.now,
                    );
                    if parked {
                        tracing::debug!(
                            handler = name,
                            nick = %event.sender.nickname,
                            "deferred pending account lookup"
                        );
                        if !chainable {
                            break;
                        }
                    } else if Classification::Anyone.satisfies(level) {
                        // A lookup for this nick failed within the
                        // retry window; until it reopens the sender
                        // counts as accountless, not unknown.
                        self.invoke(plugin, spec_index, name, &invocation).await;
                        if !chainable {
                            break;
                        }
                    }
                }
                Gate::Allow => {
                    self.invoke(plugin, spec_index, name, &invocation).await;
                    if !chainable {
                        break;
                    }
                }
            }
        }

        self.drain_bus().await;
        self.pump_whois();
    }

    /// Scheduler tick: fire due delays, run periodics, police the
    /// WHOIS pipeline.
    pub async fn tick(&mut self, now: i64) {
        self.core.now = now;
        for entry in self.core.sched.due(now) {
            let cont = {
                let mut ctx = PluginCtx {
                    core: &mut self.core,
                    plugin: entry.plugin,
                };
                self.plugins[entry.plugin]
                    .resume(&mut ctx, entry.token, None)
                    .await
            };
            if cont == Continuation::Done {
                self.core.sched.cancel(entry.token);
            }
        }
        for p in 0..self.plugins.len() {
            let res = {
                let mut ctx = PluginCtx {
                    core: &mut self.core,
                    plugin: p,
                };
                self.plugins[p].periodic(&mut ctx, now).await
            };
            if let Err(err) = res {
                tracing::warn!(
                    plugin = self.plugins[p].name(),
                    code = err.error_code(),
                    %err,
                    "periodic failed"
                );
            }
        }
        if let Some(resolved) = self.whois.expire(now) {
            tracing::debug!(nick = %resolved.nick, "account lookup timed out");
            self.replay(resolved).await;
        }
        self.drain_bus().await;
        self.pump_whois();
    }

    /// Earliest moment the engine wants a tick before the regular
    /// cadence, as a UNIX timestamp.
    pub fn next_wakeup(&self) -> Option<i64> {
        self.core.sched.next_fire()
    }

    /// Per-connection state reset, called by the supervisor before a
    /// new connection attempt. Suspended plugin units survive.
    pub fn reset_connection(&mut self) {
        self.core.registered = false;
        self.core.nickname = self.core.config.server.nickname.clone();
        self.core.users.clear();
        self.core.outbound.clear();
        self.core.immediate.clear();
        self.core.reconnect_requested = false;
        self.whois.reset();
    }

    /// Protocol obligations that are the engine's own, not any
    /// plugin's: keepalive, registration fallout, identity tracking,
    /// and WHOIS reply consumption.
    async fn bookkeep(&mut self, event: &Event) {
        match event.kind {
            EventType::Ping => {
                self.core
                    .immediate
                    .push_back(format!("PONG :{}", event.content));
            }
            // 001 and end-of-MOTD both map here; only the first one on
            // a connection does the registration work.
            EventType::Welcome if !self.core.registered => {
                self.core.registered = true;
                if !event.target.is_empty() {
                    self.core.nickname = event.target.clone();
                }
                tracing::info!(nick = %self.core.nickname, "registered with server");
                let joins: Vec<String> = self
                    .core
                    .config
                    .bot
                    .home_channels
                    .iter()
                    .map(|c| format!("JOIN {c}"))
                    .collect();
                for line in joins {
                    self.core.outbound.push_back(Outbound { line, quiet: false });
                }
            }
            EventType::NickInUse if !self.core.registered => {
                let rejected = if event.aux.is_empty() {
                    self.core.nickname.clone()
                } else {
                    event.aux.clone()
                };
                // Underscores only go so far before the nick length
                // cap bites; switch to a random suffix after that.
                let mutated = if rejected.len() >= 12 {
                    use rand::Rng;
                    let base: String = rejected.chars().take(8).collect();
                    format!("{base}{}", rand::thread_rng().gen_range(100..=999))
                } else {
                    format!("{rejected}_")
                };
                tracing::info!(rejected, mutated, "nickname taken, mutating");
                self.core.nickname = mutated.clone();
                self.core.immediate.push_back(format!("NICK {mutated}"));
            }
            EventType::Nick => {
                let old = event.sender.nickname.clone();
                let new = event.aux.clone();
                if wintermute_proto::irc_eq(&old, &self.core.nickname) {
                    self.core.nickname = new.clone();
                }
                self.core.users.rename(&old, &new);
                self.whois.rename(&old, &new);
            }
            EventType::Quit => {
                self.core.users.forget(&event.sender.nickname);
                self.whois.forget(&event.sender.nickname);
            }
            EventType::Account => {
                let account = if event.aux == "*" {
                    None
                } else {
                    Some(event.aux.clone())
                };
                self.core
                    .users
                    .set(&event.sender.nickname, account, self.core.now);
            }
            EventType::WhoisAccountReply => {
                self.whois.note_account(&event.target, &event.aux);
                self.core
                    .users
                    .set(&event.target, Some(event.aux.clone()), self.core.now);
            }
            EventType::EndOfWhois => {
                if let Some(resolved) = self.whois.complete(&event.target) {
                    self.core
                        .users
                        .set(&resolved.nick, resolved.account.clone(), self.core.now);
                    self.replay(resolved).await;
                }
            }
            EventType::UnknownCommandReply => {
                if let Some(resolved) = self.whois.unknown_command(&event.aux) {
                    self.replay(resolved).await;
                }
            }
            _ => {}
        }
    }

    /// Re-run parked invocations now that the sender's account is
    /// known (or known to be unknowable). Replays re-check privilege
    /// but never re-defer.
    async fn replay(&mut self, resolved: Resolved) {
        for mut entry in resolved.replays {
            entry.event.sender.account = resolved.account.clone();
            let Some((level, name)) = self
                .registry
                .iter()
                .find(|h| h.plugin == entry.plugin && h.spec_index == entry.spec_index)
                .map(|h| (h.spec.level, h.spec.name))
            else {
                continue;
            };
            let authorized = {
                let bot = &self.core.config.bot;
                let class = match &entry.event.sender.account {
                    Some(account) => classify_account(bot, account),
                    None if self.whois.degraded() => {
                        classify_mask(bot, &entry.event.sender.mask())
                    }
                    None => Classification::Anyone,
                };
                class.satisfies(level)
            };
            if authorized {
                self.invoke(entry.plugin, entry.spec_index, name, &entry.event)
                    .await;
            } else {
                tracing::debug!(
                    handler = name,
                    nick = %resolved.nick,
                    "dropping deferred invocation, sender not authorized"
                );
            }
        }
    }

    /// Run one handler. Encoding failures get a single retry against a
    /// sanitized event; usage failures answer the sender; anything
    /// else is logged and swallowed.
    async fn invoke(&mut self, plugin: usize, spec_index: usize, name: &'static str, event: &Event) {
        let res = {
            let mut ctx = PluginCtx {
                core: &mut self.core,
                plugin,
            };
            self.plugins[plugin].handle(&mut ctx, spec_index, event).await
        };
        match res {
            Ok(()) => {}
            Err(HandlerError::Encoding(detail)) => {
                tracing::debug!(handler = name, detail, "retrying with sanitized content");
                let mut cleaned = event.clone();
                cleaned.content = sanitize_line(&event.content);
                let retry = {
                    let mut ctx = PluginCtx {
                        core: &mut self.core,
                        plugin,
                    };
                    self.plugins[plugin].handle(&mut ctx, spec_index, &cleaned).await
                };
                if let Err(err) = retry {
                    tracing::warn!(
                        handler = name,
                        code = err.error_code(),
                        %err,
                        "handler failed after sanitized retry"
                    );
                }
            }
            Err(HandlerError::Usage(usage)) => {
                let mut ctx = PluginCtx {
                    core: &mut self.core,
                    plugin,
                };
                ctx.reply(event, &format!("usage: {usage}"));
            }
            Err(err) => {
                tracing::warn!(
                    handler = name,
                    code = err.error_code(),
                    %err,
                    "handler failed"
                );
            }
        }
    }

    async fn drain_bus(&mut self) {
        while let Some(msg) = self.core.bus_queue.pop_front() {
            for p in 0..self.plugins.len() {
                if p == msg.from {
                    continue;
                }
                let mut ctx = PluginCtx {
                    core: &mut self.core,
                    plugin: p,
                };
                self.plugins[p]
                    .on_bus_message(&mut ctx, &msg.header, &msg.payload)
                    .await;
            }
        }
    }

    fn pump_whois(&mut self) {
        // WHOIS rides the unthrottled path; its own bucket already
        // limits it far below the chat rate.
        if let Some(line) = self.whois.pump(self.core.now) {
            self.core.immediate.push_back(line);
        }
    }
}

/// Decide whether one descriptor fires for `event` and, if the text
/// matters, what the handler should see as content.
fn plan_invocation(
    spec: &HandlerSpec,
    core: &CoreState,
    degraded: bool,
    event: &Event,
) -> Option<(Gate, Event)> {
    if !spec.matches_kind(event.kind) {
        return None;
    }
    if spec.channel_policy == ChannelPolicy::HomeOnly {
        if let Some(chan) = &event.channel {
            if !core.is_home(chan) {
                return None;
            }
        }
    }
    let mut invocation = event.clone();
    if let Some(word) = spec.command {
        let bot = &core.config.bot;
        // In a direct query the prefix is optional.
        let stripped = if event.kind == EventType::PrivateMessage
            && spec.prefix_policy == PrefixPolicy::Prefixed
        {
            event
                .content
                .strip_prefix(bot.prefix.as_str())
                .unwrap_or(&event.content)
        } else {
            router::strip_address(
                &event.content,
                spec.prefix_policy,
                &bot.prefix,
                &core.nickname,
                bot.prefix_fallback_to_nick,
            )?
        };
        let args = router::match_command(stripped, word)?;
        invocation.content = args.to_string();
    } else if let Some(pattern) = &spec.pattern {
        if !pattern.is_match(&event.content) {
            return None;
        }
    }
    Some((authorize(core, degraded, spec.level, event), invocation))
}

/// The privilege gate. Senders with a resolved account classify by
/// account. Without one, a fresh negative answer (the server said,
/// within the retry window, that this nick has no account) classifies
/// as `Anyone`; anything stale defers to WHOIS, even for `Anyone`
/// requirements, so an account blacklist can catch up with a sender.
fn authorize(core: &CoreState, degraded: bool, level: PrivilegeLevel, event: &Event) -> Gate {
    if level == PrivilegeLevel::Ignore {
        return Gate::Allow;
    }
    let sender = &event.sender;
    if sender.nickname.is_empty() {
        // Server-originated; no identity to hold against it.
        return if level <= PrivilegeLevel::Anyone {
            Gate::Allow
        } else {
            Gate::Deny
        };
    }
    let bot = &core.config.bot;
    if let Some(account) = &sender.account {
        return if classify_account(bot, account).satisfies(level) {
            Gate::Allow
        } else {
            Gate::Deny
        };
    }
    if degraded {
        return if classify_mask(bot, &sender.mask()).satisfies(level) {
            Gate::Allow
        } else {
            Gate::Deny
        };
    }
    let window = core.config.whois.retry_window_secs as i64;
    let fresh = core
        .users
        .get(&sender.nickname)
        .is_some_and(|e| core.now - e.checked_at < window);
    if fresh {
        if Classification::Anyone.satisfies(level) {
            Gate::Allow
        } else {
            Gate::Deny
        }
    } else {
        Gate::Defer
    }
}
