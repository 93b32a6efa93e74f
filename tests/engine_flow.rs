//! End-to-end engine flows over raw protocol lines: deferred
//! authorization, degraded mode, scheduling, and chained dispatch.

use std::sync::Arc;
use wintermute::config::Config;
use wintermute::engine::Engine;
use wintermute::plugins::default_set;

fn engine(extra: &str) -> Engine {
    let doc = format!(
        r#"
        [server]
        host = "irc.example.net"
        nickname = "wm"
        {extra}
        "#
    );
    let config: Config = toml::from_str(&doc).unwrap();
    config.validate().unwrap();
    Engine::new(Arc::new(config), default_set())
}

fn drain_outbound(engine: &mut Engine) -> Vec<String> {
    engine.core.outbound.drain(..).map(|o| o.line).collect()
}

fn drain_immediate(engine: &mut Engine) -> Vec<String> {
    engine.core.immediate.drain(..).collect()
}

#[tokio::test]
async fn admin_command_defers_to_whois_then_fires() {
    let mut e = engine("[bot]\nadmins = [\"ada\"]\nhome_channels = [\"#chat\"]");

    e.handle_line(":alice!a@h PRIVMSG #chat :!die bye", 100).await;
    // Nothing fired yet; a lookup went out instead.
    assert!(!e.core.quit_requested);
    assert_eq!(drain_immediate(&mut e), vec!["WHOIS alice"]);

    e.handle_line(":srv 330 wm alice ada :is logged in as", 101)
        .await;
    e.handle_line(":srv 318 wm alice :End of /WHOIS list.", 102)
        .await;

    assert!(e.core.quit_requested);
    assert_eq!(drain_immediate(&mut e), vec!["QUIT :bye"]);
}

#[tokio::test]
async fn unregistered_sender_is_dropped_and_not_reasked() {
    let mut e = engine("[bot]\nadmins = [\"ada\"]");

    e.handle_line(":bob!b@h PRIVMSG wm :die", 100).await;
    assert_eq!(drain_immediate(&mut e), vec!["WHOIS bob"]);

    // End of WHOIS with no account line: bob is unregistered.
    e.handle_line(":srv 318 wm bob :End of /WHOIS list.", 101)
        .await;
    assert!(!e.core.quit_requested);

    // Within the retry window the engine does not ask again.
    e.handle_line(":bob!b@h PRIVMSG wm :die", 150).await;
    assert!(drain_immediate(&mut e).is_empty());
    assert!(!e.core.quit_requested);
}

#[tokio::test]
async fn repeated_unknown_command_degrades_to_hostmasks() {
    let mut e = engine(
        "[bot]\noperators = [\"op!*@trusted.example\"]\n\n[whois]\nretry_window_secs = 5",
    );

    for i in 0u8..3 {
        let now = 100 + i64::from(i) * 10;
        e.handle_line(
            &format!(":op!x@trusted.example PRIVMSG wm :join #room{i}"),
            now,
        )
        .await;
        assert_eq!(drain_immediate(&mut e), vec!["WHOIS op"], "round {i}");
        e.handle_line(":srv 421 wm WHOIS :Unknown command", now + 1)
            .await;
    }

    // The third failure tripped degraded mode, and its replay already
    // authorized the sender by hostmask.
    assert_eq!(drain_outbound(&mut e), vec!["JOIN #room2"]);

    // From here on hostmask checks are immediate, no WHOIS at all.
    e.handle_line(":op!x@trusted.example PRIVMSG wm :join #room3", 140)
        .await;
    assert!(drain_immediate(&mut e).is_empty());
    assert_eq!(drain_outbound(&mut e), vec!["JOIN #room3"]);

    // An untrusted mask stays locked out.
    e.handle_line(":eve!x@evil.example PRIVMSG wm :join #room4", 141)
        .await;
    assert!(drain_outbound(&mut e).is_empty());
    assert!(drain_immediate(&mut e).is_empty());
}

#[tokio::test]
async fn failed_lookup_still_serves_anyone_within_retry_window() {
    let mut e = engine("");

    e.handle_line(":bob!b@h PRIVMSG #chat :!seen alice", 100).await;
    assert_eq!(drain_immediate(&mut e), vec!["WHOIS bob"]);

    // One 421 is below the degradation threshold; the parked command
    // replays as accountless.
    e.handle_line(":srv 421 wm WHOIS :Unknown command", 101).await;
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :I have not seen alice."]
    );

    // Inside the retry window there is no second lookup, and the
    // sender is still served at the anyone level.
    e.handle_line(":bob!b@h PRIVMSG #chat :!seen carol", 110).await;
    assert!(drain_immediate(&mut e).is_empty());
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :I have not seen carol."]
    );
}

#[tokio::test]
async fn poll_runs_on_awaits_and_delay() {
    let mut e = engine("[bot]\nhome_channels = [\"#chat\"]\nwhitelist = [\"ada\"]");

    // account-notify puts alice's account in the cache up front, so
    // the poll command needs no lookup.
    e.handle_line(":alice!a@h ACCOUNT ada", 99).await;
    e.handle_line(":alice!a@h PRIVMSG #chat :!poll 30 ship it?", 100)
        .await;
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :Poll: ship it? -- answer 'aye' or 'nay' within 30s"]
    );
    assert_eq!(e.next_wakeup(), Some(130));

    e.handle_line(":bob!b@h PRIVMSG #chat :aye", 105).await;
    e.handle_line(":carol!c@h PRIVMSG #chat :aye", 106).await;
    e.handle_line(":bob!b@h PRIVMSG #chat :nay", 107).await; // revote ignored

    // Nothing closes before the deadline.
    e.tick(120).await;
    assert!(drain_outbound(&mut e).is_empty());

    e.tick(131).await;
    let lines = drain_outbound(&mut e);
    assert_eq!(
        lines,
        vec!["PRIVMSG #chat :Poll closed: ship it? -- 2 aye, 0 nay, the ayes have it"]
    );
    assert!(e.next_wakeup().is_none());
}

#[tokio::test]
async fn home_only_commands_ignore_foreign_channels() {
    let mut e = engine("[bot]\nhome_channels = [\"#chat\"]\nwhitelist = [\"ada\"]");

    e.handle_line(":alice!a@h ACCOUNT ada", 99).await;
    e.handle_line(":alice!a@h PRIVMSG #elsewhere :!poll 30 ship it?", 100)
        .await;
    assert!(drain_outbound(&mut e).is_empty());
    assert!(e.next_wakeup().is_none());

    // The same sender in a home channel is answered.
    e.handle_line(":alice!a@h PRIVMSG #chat :!poll 30 ship it?", 101)
        .await;
    assert_eq!(drain_outbound(&mut e).len(), 1);
}

#[tokio::test]
async fn awareness_chains_ahead_of_terminating_commands() {
    let mut e = engine("");

    e.handle_line(":alice!a@h JOIN #chat", 100).await;
    // account-notify priming keeps the askers out of the WHOIS path.
    e.handle_line(":bob!b@h ACCOUNT bobby", 159).await;
    e.handle_line(":bob!b@h PRIVMSG #chat :!seen alice", 160)
        .await;
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :alice was last seen 1m ago, joining #chat"]
    );

    // The tracker also saw bob's command line go past.
    e.handle_line(":carol!c@h ACCOUNT cc", 199).await;
    e.handle_line(":carol!c@h PRIVMSG #chat :!seen bob", 200)
        .await;
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :bob was last seen 40s ago, saying \"!seen alice\" in #chat"]
    );
}

#[tokio::test]
async fn blacklisted_account_is_denied_even_anyone_commands() {
    let mut e = engine("[bot]\nblacklist = [\"mallory\"]");

    e.handle_line(":mal!m@h ACCOUNT mallory", 100).await;
    e.handle_line(":mal!m@h PRIVMSG #chat :!seen alice", 101).await;
    assert!(drain_outbound(&mut e).is_empty());

    // Someone else asking is fine.
    e.handle_line(":bob!b@h ACCOUNT bobby", 101).await;
    e.handle_line(":bob!b@h PRIVMSG #chat :!seen ghost", 102).await;
    assert_eq!(
        drain_outbound(&mut e),
        vec!["PRIVMSG #chat :I have not seen ghost."]
    );
}

#[tokio::test]
async fn nick_change_follows_pending_lookup() {
    let mut e = engine("[bot]\noperators = [\"olaf\"]");

    e.handle_line(":olaf!o@h PRIVMSG wm :join #ops", 100).await;
    assert_eq!(drain_immediate(&mut e), vec!["WHOIS olaf"]);

    // The sender renames while the lookup is out; the reply comes back
    // under the old query but the parked work must still land.
    e.handle_line(":olaf!o@h NICK olly", 101).await;
    e.handle_line(":srv 330 wm olly olaf :is logged in as", 102)
        .await;
    e.handle_line(":srv 318 wm olly :End of /WHOIS list.", 103)
        .await;
    assert_eq!(drain_outbound(&mut e), vec!["JOIN #ops"]);
}
