//! Plugin trait and handler descriptors.
//!
//! Plugins contribute data, not code generation: each one returns a
//! list of [`HandlerSpec`] values at startup and the router interprets
//! that table. The engine holds plugins as a homogeneous collection of
//! `Box<dyn Plugin>` and never inspects their internals beyond this
//! interface.

mod admin;
mod ctcp;
mod poll;
mod seen;

pub use admin::AdminPlugin;
pub use ctcp::CtcpPlugin;
pub use poll::PollPlugin;
pub use seen::SeenPlugin;

pub use crate::engine::privilege::PrivilegeLevel;

use crate::engine::context::PluginCtx;
use crate::engine::scheduler::{Continuation, Token};
use crate::error::HandlerResult;
use crate::event::{Event, EventType};
use async_trait::async_trait;
use regex::Regex;

/// Where a handler may fire relative to channel membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// Only in the configured home channels (non-channel events bypass).
    HomeOnly,
    /// Anywhere.
    Any,
}

/// How command text must address the bot before the command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixPolicy {
    /// Content is matched as-is.
    Direct,
    /// Content must start with the configured prefix. Falls back to
    /// `Nickname` when `bot.prefix_fallback_to_nick` is set.
    Prefixed,
    /// Content must start with the bot's nickname (`wm: cmd` / `wm, cmd`).
    Nickname,
}

/// Dispatch phase. Cross-cutting awareness handlers run in the outer
/// phases; ordinary command handlers run in `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Setup,
    Early,
    Normal,
    Late,
    Cleanup,
}

/// Registration-time metadata for one handler function.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    /// Handler identity, used in logs.
    pub name: &'static str,
    /// Matched event types; `None` matches any event.
    pub events: Option<Vec<EventType>>,
    /// Channel membership filter.
    pub channel_policy: ChannelPolicy,
    /// Privilege the sender must satisfy.
    pub level: PrivilegeLevel,
    /// How command text addresses the bot.
    pub prefix_policy: PrefixPolicy,
    /// Leading command word, compared case-insensitively.
    pub command: Option<&'static str>,
    /// Alternative to `command`: a pattern run against the content.
    pub pattern: Option<Regex>,
    /// Whether dispatch continues past this handler after it fires.
    pub chainable: bool,
    /// Dispatch phase.
    pub phase: Phase,
}

impl HandlerSpec {
    /// A `Normal`-phase command handler. Terminating by default: a
    /// successful match stops the dispatch chain.
    pub fn command(name: &'static str, word: &'static str, events: &[EventType]) -> Self {
        Self {
            name,
            events: Some(events.to_vec()),
            channel_policy: ChannelPolicy::Any,
            level: PrivilegeLevel::Anyone,
            prefix_policy: PrefixPolicy::Prefixed,
            command: Some(word),
            pattern: None,
            chainable: false,
            phase: Phase::Normal,
        }
    }

    /// A cross-cutting awareness handler: matches any event type,
    /// requires nothing of the sender, and chains by default.
    pub fn awareness(name: &'static str, phase: Phase) -> Self {
        Self {
            name,
            events: None,
            channel_policy: ChannelPolicy::Any,
            level: PrivilegeLevel::Ignore,
            prefix_policy: PrefixPolicy::Direct,
            command: None,
            pattern: None,
            chainable: true,
            phase,
        }
    }

    /// A pattern-matched handler over the given event types.
    pub fn pattern(name: &'static str, pattern: Regex, events: &[EventType]) -> Self {
        Self {
            name,
            events: Some(events.to_vec()),
            channel_policy: ChannelPolicy::Any,
            level: PrivilegeLevel::Ignore,
            prefix_policy: PrefixPolicy::Direct,
            command: None,
            pattern: Some(pattern),
            chainable: false,
            phase: Phase::Normal,
        }
    }

    /// Narrow the matched event types.
    pub fn events(mut self, kinds: &[EventType]) -> Self {
        self.events = Some(kinds.to_vec());
        self
    }

    /// Restrict to the configured home channels.
    pub fn home_only(mut self) -> Self {
        self.channel_policy = ChannelPolicy::HomeOnly;
        self
    }

    /// Require the given privilege level of the sender.
    pub fn level(mut self, level: PrivilegeLevel) -> Self {
        self.level = level;
        self
    }

    /// Allow dispatch to continue past this handler.
    pub fn chainable(mut self) -> Self {
        self.chainable = true;
        self
    }

    /// Override the dispatch phase.
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Override the prefix policy.
    pub fn prefix_policy(mut self, policy: PrefixPolicy) -> Self {
        self.prefix_policy = policy;
        self
    }

    /// Whether this descriptor matches the given event type.
    pub fn matches_kind(&self, kind: EventType) -> bool {
        match &self.events {
            None => true,
            Some(kinds) => kinds.contains(&kind),
        }
    }
}

/// The narrow interface every plugin implements.
///
/// `spec_index` in [`Plugin::handle`] is the position of the matched
/// descriptor within this plugin's own `descriptors()` list, so one
/// plugin can serve several commands from a single `handle` body.
#[async_trait]
pub trait Plugin: Send {
    /// Plugin identity, used in logs.
    fn name(&self) -> &'static str;

    /// The handler descriptors this plugin registers at startup.
    fn descriptors(&self) -> Vec<HandlerSpec>;

    /// Invoke the handler behind `spec_index` for `event`.
    async fn handle(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        spec_index: usize,
        event: &Event,
    ) -> HandlerResult;

    /// Resume a suspended unit. `event` is `Some` for awaited events
    /// and `None` for timer expirations. Return [`Continuation::Done`]
    /// to unregister the unit.
    async fn resume(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        token: Token,
        event: Option<&Event>,
    ) -> Continuation {
        let _ = (ctx, token, event);
        Continuation::Done
    }

    /// Called once per scheduler tick with the current UNIX time.
    async fn periodic(&mut self, ctx: &mut PluginCtx<'_>, now: i64) -> HandlerResult {
        let _ = (ctx, now);
        Ok(())
    }

    /// Receive a cross-plugin bus broadcast.
    async fn on_bus_message(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        header: &str,
        payload: &serde_json::Value,
    ) {
        let _ = (ctx, header, payload);
    }
}

/// The plugin set a stock wintermute runs with.
pub fn default_set() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(CtcpPlugin::new()),
        Box::new(SeenPlugin::new()),
        Box::new(PollPlugin::new()),
        Box::new(AdminPlugin::new()),
    ]
}
