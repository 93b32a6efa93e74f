//! Channel polls, driven by the scheduler primitives.
//!
//! `poll <secs> <question>` announces a question, awaits votes as
//! plain `aye`/`nay` lines in the channel, and tallies when the delay
//! fires. One poll runs at a time.

use super::{HandlerSpec, Phase, Plugin, PrivilegeLevel};
use crate::engine::context::PluginCtx;
use crate::engine::scheduler::{Continuation, Token};
use crate::error::{HandlerError, HandlerResult};
use crate::event::{Event, EventType};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use wintermute_proto::{irc_eq, irc_to_lower};

const START: usize = 0;
const ABORT: usize = 1;

const MIN_SECS: i64 = 10;
const MAX_SECS: i64 = 600;

#[derive(Debug)]
struct ActivePoll {
    channel: String,
    question: String,
    ayes: u32,
    nays: u32,
    voted: HashSet<String>,
    vote_token: Token,
    timer_token: Token,
}

pub struct PollPlugin {
    active: Option<ActivePoll>,
}

impl PollPlugin {
    pub fn new() -> Self {
        Self { active: None }
    }
}

impl Default for PollPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Votes are keyed by account when one is known, nick otherwise.
fn voter_key(event: &Event) -> String {
    match &event.sender.account {
        Some(account) => irc_to_lower(account),
        None => irc_to_lower(&event.sender.nickname),
    }
}

#[async_trait]
impl Plugin for PollPlugin {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn descriptors(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::command("poll", "poll", &[EventType::ChannelMessage])
                .home_only()
                .level(PrivilegeLevel::Whitelist),
            // The bot leaving the poll channel aborts the poll.
            HandlerSpec::awareness("poll-abort", Phase::Cleanup)
                .events(&[EventType::Part, EventType::Kick]),
        ]
    }

    async fn handle(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        spec_index: usize,
        event: &Event,
    ) -> HandlerResult {
        if spec_index == ABORT {
            let gone = match event.kind {
                EventType::Part => irc_eq(&event.sender.nickname, ctx.nickname()),
                EventType::Kick => irc_eq(&event.target, ctx.nickname()),
                _ => false,
            };
            let ours = self.active.as_ref().is_some_and(|p| {
                event.channel.as_deref().is_some_and(|c| irc_eq(c, &p.channel))
            });
            if gone && ours {
                if let Some(poll) = self.active.take() {
                    tracing::info!(channel = %poll.channel, "poll aborted, bot left the channel");
                    ctx.cancel(poll.vote_token);
                    ctx.cancel(poll.timer_token);
                }
            }
            return Ok(());
        }

        if self.active.is_some() {
            ctx.reply(event, "A poll is already running.");
            return Ok(());
        }
        let (secs_word, question) = event
            .content
            .split_once(char::is_whitespace)
            .ok_or(HandlerError::Usage("poll <secs> <question>"))?;
        let secs: i64 = secs_word
            .parse()
            .map_err(|_| HandlerError::Usage("poll <secs> <question>"))?;
        let secs = secs.clamp(MIN_SECS, MAX_SECS);
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(HandlerError::Usage("poll <secs> <question>"));
        }

        let channel = match &event.channel {
            Some(c) => c.clone(),
            None => return Ok(()),
        };
        ctx.msg(
            &channel,
            &format!("Poll: {question} -- answer 'aye' or 'nay' within {secs}s"),
        );
        let vote_token = ctx.await_events(&[EventType::ChannelMessage]);
        let timer_token = ctx.delay(secs);
        self.active = Some(ActivePoll {
            channel,
            question,
            ayes: 0,
            nays: 0,
            voted: HashSet::new(),
            vote_token,
            timer_token,
        });
        Ok(())
    }

    async fn resume(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        token: Token,
        event: Option<&Event>,
    ) -> Continuation {
        let Some(poll) = self.active.as_mut() else {
            return Continuation::Done;
        };

        if token == poll.vote_token {
            let Some(event) = event else {
                return Continuation::Continue;
            };
            if event
                .channel
                .as_deref()
                .is_none_or(|c| !irc_eq(c, &poll.channel))
            {
                return Continuation::Continue;
            }
            let choice = event.content.trim().to_ascii_lowercase();
            if (choice == "aye" || choice == "nay") && poll.voted.insert(voter_key(event)) {
                if choice == "aye" {
                    poll.ayes += 1;
                } else {
                    poll.nays += 1;
                }
            }
            return Continuation::Continue;
        }

        if token == poll.timer_token {
            let Some(poll) = self.active.take() else {
                return Continuation::Done;
            };
            ctx.cancel(poll.vote_token);
            let verdict = if poll.ayes > poll.nays {
                "the ayes have it"
            } else if poll.nays > poll.ayes {
                "the nays have it"
            } else {
                "a tie"
            };
            ctx.msg(
                &poll.channel,
                &format!(
                    "Poll closed: {} -- {} aye, {} nay, {verdict}",
                    poll.question, poll.ayes, poll.nays
                ),
            );
            ctx.broadcast(
                "poll.result",
                json!({
                    "channel": poll.channel,
                    "question": poll.question,
                    "ayes": poll.ayes,
                    "nays": poll.nays,
                }),
            );
            return Continuation::Done;
        }

        Continuation::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::context::CoreState;
    use std::sync::Arc;

    fn core() -> CoreState {
        let config: Config = toml::from_str(
            r##"
            [server]
            host = "irc.example.net"
            nickname = "wm"

            [bot]
            home_channels = ["#chat"]
            "##,
        )
        .unwrap();
        let mut core = CoreState::new(Arc::new(config));
        core.now = 1000;
        core
    }

    fn vote(nick: &str, account: Option<&str>, text: &str) -> Event {
        let mut ev = Event {
            kind: EventType::ChannelMessage,
            channel: Some("#chat".to_string()),
            content: text.to_string(),
            time: 1001,
            ..Event::default()
        };
        ev.sender.nickname = nick.to_string();
        ev.sender.account = account.map(str::to_string);
        ev
    }

    #[tokio::test]
    async fn full_poll_cycle_counts_one_vote_per_voter() {
        let mut core = core();
        let mut plugin = PollPlugin::new();

        let start = vote("alice", Some("ada"), "30 ship it?");
        {
            let mut ctx = PluginCtx {
                core: &mut core,
                plugin: 0,
            };
            plugin.handle(&mut ctx, START, &start).await.unwrap();
        }
        let (vote_token, timer_token) = {
            let p = plugin.active.as_ref().unwrap();
            (p.vote_token, p.timer_token)
        };
        assert_eq!(core.sched.next_fire(), Some(1030));

        {
            let mut ctx = PluginCtx {
                core: &mut core,
                plugin: 0,
            };
            for ev in [
                vote("bob", None, "aye"),
                vote("bob", None, "nay"), // second vote ignored
                vote("carol", Some("cc"), "AYE"),
                vote("dave", None, "whatever"),
            ] {
                let cont = plugin.resume(&mut ctx, vote_token, Some(&ev)).await;
                assert_eq!(cont, Continuation::Continue);
            }
            let cont = plugin.resume(&mut ctx, timer_token, None).await;
            assert_eq!(cont, Continuation::Done);
        }

        assert!(plugin.active.is_none());
        let last = &core.outbound.back().unwrap().line;
        assert_eq!(
            last,
            "PRIVMSG #chat :Poll closed: ship it? -- 2 aye, 0 nay, the ayes have it"
        );
        // The vote await was cancelled when the poll closed.
        assert!(core.sched.awaiting(EventType::ChannelMessage).is_empty());
        assert_eq!(core.bus_queue.len(), 1);
        assert_eq!(core.bus_queue[0].header, "poll.result");
    }

    #[tokio::test]
    async fn votes_from_other_channels_do_not_count() {
        let mut core = core();
        let mut plugin = PollPlugin::new();
        {
            let mut ctx = PluginCtx {
                core: &mut core,
                plugin: 0,
            };
            plugin
                .handle(&mut ctx, START, &vote("alice", Some("ada"), "30 q?"))
                .await
                .unwrap();
            let vote_token = plugin.active.as_ref().unwrap().vote_token;
            let mut stray = vote("bob", None, "aye");
            stray.channel = Some("#elsewhere".to_string());
            plugin.resume(&mut ctx, vote_token, Some(&stray)).await;
        }
        assert_eq!(plugin.active.as_ref().unwrap().ayes, 0);
    }

    #[tokio::test]
    async fn bad_arguments_are_usage_errors() {
        let mut core = core();
        let mut plugin = PollPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        for bad in ["", "notasecs question", "30"] {
            let err = plugin
                .handle(&mut ctx, START, &vote("alice", Some("ada"), bad))
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::Usage(_)), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn bot_leaving_the_channel_aborts_the_poll() {
        let mut core = core();
        let mut plugin = PollPlugin::new();
        {
            let mut ctx = PluginCtx {
                core: &mut core,
                plugin: 0,
            };
            plugin
                .handle(&mut ctx, START, &vote("alice", Some("ada"), "30 q?"))
                .await
                .unwrap();

            let mut kicked = Event {
                kind: EventType::Kick,
                channel: Some("#chat".to_string()),
                target: "wm".to_string(),
                ..Event::default()
            };
            kicked.sender.nickname = "op".into();
            plugin.handle(&mut ctx, ABORT, &kicked).await.unwrap();
        }
        assert!(plugin.active.is_none());
        assert!(core.sched.is_idle());
    }
}
