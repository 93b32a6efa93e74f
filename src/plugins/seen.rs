//! Last-activity tracking and the `seen` command.

use super::{HandlerSpec, Phase, Plugin};
use crate::engine::context::PluginCtx;
use crate::error::{HandlerError, HandlerResult};
use crate::event::{Event, EventType};
use async_trait::async_trait;
use std::collections::HashMap;
use wintermute_proto::{irc_eq, irc_to_lower};

const TRACK: usize = 0;
const QUERY: usize = 1;

#[derive(Debug, Clone)]
struct Sighting {
    nick: String,
    at: i64,
    doing: String,
}

pub struct SeenPlugin {
    sightings: HashMap<String, Sighting>,
}

impl SeenPlugin {
    pub fn new() -> Self {
        Self {
            sightings: HashMap::new(),
        }
    }

    fn record(&mut self, nick: &str, at: i64, doing: String) {
        self.sightings.insert(
            irc_to_lower(nick),
            Sighting {
                nick: nick.to_string(),
                at,
                doing,
            },
        );
    }

    fn track(&mut self, event: &Event) {
        let nick = &event.sender.nickname;
        if nick.is_empty() {
            return;
        }
        let doing = match event.kind {
            EventType::ChannelMessage => {
                let chan = event.channel.as_deref().unwrap_or("?");
                format!("saying \"{}\" in {chan}", clip(&event.content))
            }
            EventType::Join => {
                format!("joining {}", event.channel.as_deref().unwrap_or("?"))
            }
            EventType::Part => {
                format!("leaving {}", event.channel.as_deref().unwrap_or("?"))
            }
            EventType::Quit => {
                if event.content.is_empty() {
                    "quitting".to_string()
                } else {
                    format!("quitting ({})", event.content)
                }
            }
            EventType::Nick => {
                // Record the new name too so both resolve.
                self.record(
                    &event.aux,
                    event.time,
                    format!("changing nick from {nick}"),
                );
                format!("changing nick to {}", event.aux)
            }
            EventType::Kick => {
                // The victim was also last seen being removed.
                self.record(
                    &event.target,
                    event.time,
                    format!(
                        "getting kicked from {}",
                        event.channel.as_deref().unwrap_or("?")
                    ),
                );
                format!("kicking {} from {}", event.target, event.channel.as_deref().unwrap_or("?"))
            }
            EventType::Topic => {
                format!("setting the topic in {}", event.channel.as_deref().unwrap_or("?"))
            }
            _ => return,
        };
        self.record(nick, event.time, doing);
    }
}

impl Default for SeenPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= 80 {
        text.to_string()
    } else {
        let cut: String = text.chars().take(77).collect();
        format!("{cut}...")
    }
}

fn ago(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d", secs / 86_400)
    }
}

#[async_trait]
impl Plugin for SeenPlugin {
    fn name(&self) -> &'static str {
        "seen"
    }

    fn descriptors(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::awareness("seen-track", Phase::Early),
            HandlerSpec::command(
                "seen",
                "seen",
                &[EventType::ChannelMessage, EventType::PrivateMessage],
            ),
        ]
    }

    async fn handle(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        spec_index: usize,
        event: &Event,
    ) -> HandlerResult {
        match spec_index {
            TRACK => {
                self.track(event);
                Ok(())
            }
            QUERY => {
                let wanted = event.content.split_whitespace().next().ok_or(
                    HandlerError::Usage("seen <nick>"),
                )?;
                let reply = if irc_eq(wanted, ctx.nickname()) {
                    "I'm right here.".to_string()
                } else if irc_eq(wanted, &event.sender.nickname) {
                    "Looking for yourself?".to_string()
                } else {
                    match self.sightings.get(&irc_to_lower(wanted)) {
                        Some(s) => format!(
                            "{} was last seen {} ago, {}",
                            s.nick,
                            ago(ctx.now() - s.at),
                            s.doing
                        ),
                        None => format!("I have not seen {wanted}."),
                    }
                };
                ctx.reply(event, &reply);
                Ok(())
            }
            _ => Ok(()),
        }
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
            "##,
        )
        .unwrap();
        let mut core = CoreState::new(Arc::new(config));
        core.now = 1000;
        core
    }

    fn chat(nick: &str, chan: &str, text: &str, time: i64) -> Event {
        let mut ev = Event {
            kind: EventType::ChannelMessage,
            channel: Some(chan.to_string()),
            content: text.to_string(),
            time,
            ..Event::default()
        };
        ev.sender.nickname = nick.to_string();
        ev
    }

    #[tokio::test]
    async fn reports_last_sighting_with_age() {
        let mut core = core();
        let mut plugin = SeenPlugin::new();
        {
            let mut ctx = PluginCtx {
                core: &mut core,
                plugin: 0,
            };
            plugin
                .handle(&mut ctx, TRACK, &chat("Alice", "#chat", "hello", 700))
                .await
                .unwrap();
            plugin
                .handle(&mut ctx, QUERY, &chat("bob", "#chat", "alice", 1000))
                .await
                .unwrap();
        }
        let line = &core.outbound.front().unwrap().line;
        assert_eq!(
            line,
            "PRIVMSG #chat :Alice was last seen 5m ago, saying \"hello\" in #chat"
        );
    }

    #[tokio::test]
    async fn unknown_nick_and_missing_arg() {
        let mut core = core();
        let mut plugin = SeenPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        let err = plugin
            .handle(&mut ctx, QUERY, &chat("bob", "#chat", "", 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Usage(_)));

        plugin
            .handle(&mut ctx, QUERY, &chat("bob", "#chat", "ghost", 1000))
            .await
            .unwrap();
        assert_eq!(
            ctx.core.outbound.front().unwrap().line,
            "PRIVMSG #chat :I have not seen ghost."
        );
    }

    #[tokio::test]
    async fn nick_change_records_both_names() {
        let mut core = core();
        let mut plugin = SeenPlugin::new();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        let mut ev = Event {
            kind: EventType::Nick,
            aux: "al".to_string(),
            time: 900,
            ..Event::default()
        };
        ev.sender.nickname = "alice".into();
        plugin.handle(&mut ctx, TRACK, &ev).await.unwrap();

        plugin
            .handle(&mut ctx, QUERY, &chat("bob", "#chat", "al", 1000))
            .await
            .unwrap();
        assert_eq!(
            ctx.core.outbound.front().unwrap().line,
            "PRIVMSG #chat :al was last seen 1m ago, changing nick from alice"
        );
    }
}
