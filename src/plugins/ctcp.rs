//! CTCP replies: VERSION, PING, TIME, CLIENTINFO.

use super::{HandlerSpec, Phase, Plugin, PrivilegeLevel};
use crate::engine::context::PluginCtx;
use crate::error::HandlerResult;
use crate::event::{Event, EventType};
use async_trait::async_trait;
use regex::Regex;

const DELIM: char = '\u{1}';

pub struct CtcpPlugin;

impl CtcpPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CtcpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for CtcpPlugin {
    fn name(&self) -> &'static str {
        "ctcp"
    }

    fn descriptors(&self) -> Vec<HandlerSpec> {
        vec![HandlerSpec::pattern(
            "ctcp",
            Regex::new(r"^\x01(VERSION|PING|TIME|CLIENTINFO)").unwrap(),
            &[EventType::PrivateMessage],
        )
        .level(PrivilegeLevel::Anyone)
        .phase(Phase::Early)]
    }

    async fn handle(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        _spec_index: usize,
        event: &Event,
    ) -> HandlerResult {
        let body = event.content.trim_matches(DELIM);
        let (word, args) = match body.split_once(' ') {
            Some((w, a)) => (w, a),
            None => (body, ""),
        };
        let reply = match word {
            "VERSION" => format!("VERSION wintermute {}", env!("CARGO_PKG_VERSION")),
            "PING" => format!("PING {args}"),
            "TIME" => format!("TIME {}", chrono::Local::now().to_rfc2822()),
            "CLIENTINFO" => "CLIENTINFO VERSION PING TIME CLIENTINFO".to_string(),
            _ => return Ok(()),
        };
        let nick = event.sender.nickname.clone();
        ctx.notice(&nick, &format!("{DELIM}{reply}{DELIM}"));
        Ok(())
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
        CoreState::new(Arc::new(config))
    }

    fn ctcp_event(content: &str) -> Event {
        let mut ev = Event {
            kind: EventType::PrivateMessage,
            content: content.to_string(),
            ..Event::default()
        };
        ev.sender.nickname = "alice".into();
        ev
    }

    #[tokio::test]
    async fn version_request_gets_a_delimited_notice() {
        let mut core = core();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        let mut plugin = CtcpPlugin::new();
        plugin
            .handle(&mut ctx, 0, &ctcp_event("\u{1}VERSION\u{1}"))
            .await
            .unwrap();
        let line = &core.outbound.front().unwrap().line;
        assert!(line.starts_with("NOTICE alice :\u{1}VERSION wintermute "));
        assert!(line.ends_with('\u{1}'));
    }

    #[tokio::test]
    async fn ping_echoes_the_token() {
        let mut core = core();
        let mut ctx = PluginCtx {
            core: &mut core,
            plugin: 0,
        };
        let mut plugin = CtcpPlugin::new();
        plugin
            .handle(&mut ctx, 0, &ctcp_event("\u{1}PING 12345\u{1}"))
            .await
            .unwrap();
        assert_eq!(
            core.outbound.front().unwrap().line,
            "NOTICE alice :\u{1}PING 12345\u{1}"
        );
    }
}
