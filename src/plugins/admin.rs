//! Operator and admin commands for steering the bot at runtime.

use super::{HandlerSpec, Plugin, PrivilegeLevel};
use crate::engine::context::PluginCtx;
use crate::error::{HandlerError, HandlerResult};
use crate::event::{Event, EventType};
use async_trait::async_trait;

const JOIN: usize = 0;
const PART: usize = 1;
const SAY: usize = 2;
const NICK: usize = 3;
const STATUS: usize = 4;
const DIE: usize = 5;
const RECONNECT: usize = 6;

const CHAT: &[EventType] = &[EventType::ChannelMessage, EventType::PrivateMessage];

pub struct AdminPlugin {
    started_at: Option<i64>,
    last_poll: Option<String>,
}

impl AdminPlugin {
    pub fn new() -> Self {
        Self {
            started_at: None,
            last_poll: None,
        }
    }
}

impl Default for AdminPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn require<'a>(args: &'a str, usage: &'static str) -> Result<&'a str, HandlerError> {
    let args = args.trim();
    if args.is_empty() {
        Err(HandlerError::Usage(usage))
    } else {
        Ok(args)
    }
}

#[async_trait]
impl Plugin for AdminPlugin {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn descriptors(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::command("admin-join", "join", CHAT).level(PrivilegeLevel::Operator),
            HandlerSpec::command("admin-part", "part", CHAT).level(PrivilegeLevel::Operator),
            HandlerSpec::command("admin-say", "say", CHAT).level(PrivilegeLevel::Operator),
            HandlerSpec::command("admin-nick", "nick", CHAT).level(PrivilegeLevel::Admin),
            HandlerSpec::command("admin-status", "status", CHAT).level(PrivilegeLevel::Operator),
            HandlerSpec::command("admin-die", "die", CHAT).level(PrivilegeLevel::Admin),
            HandlerSpec::command("admin-reconnect", "reconnect", CHAT)
                .level(PrivilegeLevel::Admin),
        ]
    }

    async fn handle(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        spec_index: usize,
        event: &Event,
    ) -> HandlerResult {
        match spec_index {
            JOIN => {
                let chan = require(&event.content, "join <#channel>")?;
                ctx.send(format!("JOIN {chan}"));
            }
            PART => {
                let args = require(&event.content, "part <#channel> [reason]")?;
                match args.split_once(char::is_whitespace) {
                    Some((chan, reason)) => ctx.send(format!("PART {chan} :{}", reason.trim())),
                    None => ctx.send(format!("PART {args}")),
                }
            }
            SAY => {
                let args = require(&event.content, "say <target> <text>")?;
                let (target, text) = args
                    .split_once(char::is_whitespace)
                    .ok_or(HandlerError::Usage("say <target> <text>"))?;
                ctx.msg(target, text.trim());
            }
            NICK => {
                let nick = require(&event.content, "nick <newnick>")?;
                // Local state follows once the server confirms.
                ctx.send(format!("NICK {nick}"));
            }
            STATUS => {
                let uptime = match self.started_at {
                    Some(at) => format!("{}s", (ctx.now() - at).max(0)),
                    None => "unknown".to_string(),
                };
                let homes = ctx.config().bot.home_channels.join(" ");
                let mut line = format!(
                    "I am {}, up {uptime}, home in: {homes}",
                    ctx.nickname()
                );
                if let Some(poll) = &self.last_poll {
                    line.push_str(&format!(", last poll: {poll}"));
                }
                ctx.reply(event, &line);
            }
            DIE => {
                let reason = event.content.trim();
                let reason = if reason.is_empty() { "leaving" } else { reason };
                tracing::info!(by = %event.sender.nickname, reason, "shutdown requested");
                ctx.send_immediate(format!("QUIT :{reason}"));
                ctx.request_quit();
            }
            RECONNECT => {
                tracing::info!(by = %event.sender.nickname, "reconnect requested");
                ctx.request_reconnect();
            }
            _ => {}
        }
        Ok(())
    }

    async fn periodic(&mut self, _ctx: &mut PluginCtx<'_>, now: i64) -> HandlerResult {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        Ok(())
    }

    async fn on_bus_message(
        &mut self,
        _ctx: &mut PluginCtx<'_>,
        header: &str,
        payload: &serde_json::Value,
    ) {
        if header == "poll.result" {
            let question = payload["question"].as_str().unwrap_or("?");
            let ayes = payload["ayes"].as_u64().unwrap_or(0);
            let nays = payload["nays"].as_u64().unwrap_or(0);
            self.last_poll = Some(format!("\"{question}\" ({ayes} aye / {nays} nay)"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::context::CoreState;
    use serde_json::json;
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
        core.now = 500;
        core
    }

    fn cmd(args: &str) -> Event {
        let mut ev = Event {
            kind: EventType::ChannelMessage,
            channel: Some("#chat".to_string()),
            content: args.to_string(),
            ..Event::default()
        };
        ev.sender.nickname = "ada".into();
        ev
    }

    #[tokio::test]
    async fn join_part_say_emit_raw_lines() {
        let mut core = core();
        let mut plugin = AdminPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        plugin.handle(&mut ctx, JOIN, &cmd("#new")).await.unwrap();
        plugin
            .handle(&mut ctx, PART, &cmd("#old done here"))
            .await
            .unwrap();
        plugin
            .handle(&mut ctx, SAY, &cmd("#chat hello world"))
            .await
            .unwrap();

        let lines: Vec<_> = ctx.core.outbound.iter().map(|o| o.line.clone()).collect();
        assert_eq!(
            lines,
            vec![
                "JOIN #new",
                "PART #old :done here",
                "PRIVMSG #chat :hello world"
            ]
        );
    }

    #[tokio::test]
    async fn die_queues_immediate_and_raises_flag() {
        let mut core = core();
        let mut plugin = AdminPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        plugin.handle(&mut ctx, DIE, &cmd("")).await.unwrap();
        assert!(core.quit_requested);
        assert_eq!(core.immediate.pop_front().as_deref(), Some("QUIT :leaving"));
    }

    #[tokio::test]
    async fn status_includes_last_poll_from_bus() {
        let mut core = core();
        let mut plugin = AdminPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        plugin.periodic(&mut ctx, 100).await.unwrap();
        plugin
            .on_bus_message(
                &mut ctx,
                "poll.result",
                &json!({"question": "ship it?", "ayes": 2, "nays": 1}),
            )
            .await;
        plugin.handle(&mut ctx, STATUS, &cmd("")).await.unwrap();
        let line = &ctx.core.outbound.front().unwrap().line;
        assert_eq!(
            line,
            "PRIVMSG #chat :I am wm, up 400s, home in: #chat, last poll: \"ship it?\" (2 aye / 1 nay)"
        );
    }

    #[tokio::test]
    async fn missing_arguments_are_usage_errors() {
        let mut core = core();
        let mut plugin = AdminPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        for (idx, arg) in [(JOIN, ""), (SAY, "#chat")] {
            let err = plugin.handle(&mut ctx, idx, &cmd(arg)).await.unwrap_err();
            assert!(matches!(err, HandlerError::Usage(_)));
        }
    }
}
