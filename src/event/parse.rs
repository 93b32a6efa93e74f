//! Conversion from a parsed protocol message to an engine [`Event`].

use super::{Event, EventType, Identity};
use wintermute_proto::{numeric, Message, ProtoError};

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

fn identity_from(msg: &Message) -> Identity {
    match &msg.source {
        Some(src) if !src.is_server() => Identity {
            nickname: src.nick.clone(),
            ident: src.user.clone().unwrap_or_default(),
            address: src.host.clone().unwrap_or_default(),
            account: None,
        },
        _ => Identity::default(),
    }
}

/// Strip control characters that break downstream text handling,
/// keeping IRC formatting intact is not a goal here: this copy only
/// exists for the one retry the router performs on encoding failures.
pub fn sanitize_line(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect()
}

/// Parse one raw line into an [`Event`].
///
/// On a parse failure the caller is expected to retry once against
/// [`sanitize_line`] output and otherwise drop the line.
pub fn event_from_line(line: &str, now: i64) -> Result<Event, ProtoError> {
    let msg = Message::parse(line)?;
    Ok(event_from_message(&msg, line, now))
}

fn event_from_message(msg: &Message, raw: &str, now: i64) -> Event {
    let mut ev = Event {
        sender: identity_from(msg),
        raw: raw.to_string(),
        time: now,
        ..Event::default()
    };

    if let Some(num) = msg.numeric() {
        ev.num = Some(num);
        match num {
            // End of MOTD (or its absence) doubles as a registration
            // signal on servers that never send a clean 001.
            numeric::RPL_WELCOME | numeric::RPL_ENDOFMOTD | numeric::ERR_NOMOTD => {
                ev.kind = EventType::Welcome;
                ev.target = msg.param(0).unwrap_or_default().to_string();
            }
            numeric::ERR_NICKNAMEINUSE | numeric::ERR_ERRONEUSNICKNAME => {
                ev.kind = EventType::NickInUse;
                ev.aux = msg.param(1).unwrap_or_default().to_string();
            }
            numeric::RPL_WHOISACCOUNT => {
                // :server 330 me nick account :is logged in as
                ev.kind = EventType::WhoisAccountReply;
                ev.target = msg.param(1).unwrap_or_default().to_string();
                ev.aux = msg.param(2).unwrap_or_default().to_string();
            }
            numeric::RPL_ENDOFWHOIS => {
                ev.kind = EventType::EndOfWhois;
                ev.target = msg.param(1).unwrap_or_default().to_string();
            }
            numeric::ERR_UNKNOWNCOMMAND => {
                ev.kind = EventType::UnknownCommandReply;
                ev.aux = msg.param(1).unwrap_or_default().to_string();
            }
            _ => {
                ev.kind = EventType::Numeric;
                ev.content = msg.params.last().cloned().unwrap_or_default();
            }
        }
        return ev;
    }

    match msg.command.as_str() {
        "PRIVMSG" => {
            let target = msg.param(0).unwrap_or_default().to_string();
            ev.content = msg.param(1).unwrap_or_default().to_string();
            if is_channel(&target) {
                ev.kind = EventType::ChannelMessage;
                ev.channel = Some(target.clone());
            } else {
                ev.kind = EventType::PrivateMessage;
            }
            ev.target = target;
        }
        "NOTICE" => {
            let target = msg.param(0).unwrap_or_default().to_string();
            ev.kind = EventType::Notice;
            if is_channel(&target) {
                ev.channel = Some(target.clone());
            }
            ev.target = target;
            ev.content = msg.param(1).unwrap_or_default().to_string();
        }
        "JOIN" => {
            ev.kind = EventType::Join;
            ev.channel = Some(msg.param(0).unwrap_or_default().to_string());
        }
        "PART" => {
            ev.kind = EventType::Part;
            ev.channel = Some(msg.param(0).unwrap_or_default().to_string());
            ev.content = msg.param(1).unwrap_or_default().to_string();
        }
        "QUIT" => {
            ev.kind = EventType::Quit;
            ev.content = msg.param(0).unwrap_or_default().to_string();
        }
        "NICK" => {
            ev.kind = EventType::Nick;
            ev.aux = msg.param(0).unwrap_or_default().to_string();
        }
        "KICK" => {
            ev.kind = EventType::Kick;
            ev.channel = Some(msg.param(0).unwrap_or_default().to_string());
            ev.target = msg.param(1).unwrap_or_default().to_string();
            ev.content = msg.param(2).unwrap_or_default().to_string();
        }
        "MODE" => {
            let target = msg.param(0).unwrap_or_default().to_string();
            ev.kind = EventType::Mode;
            if is_channel(&target) {
                ev.channel = Some(target.clone());
            }
            ev.target = target;
            ev.content = msg.params.get(1..).unwrap_or_default().join(" ");
        }
        "TOPIC" => {
            ev.kind = EventType::Topic;
            ev.channel = Some(msg.param(0).unwrap_or_default().to_string());
            ev.content = msg.param(1).unwrap_or_default().to_string();
        }
        "INVITE" => {
            ev.kind = EventType::Invite;
            ev.target = msg.param(0).unwrap_or_default().to_string();
            ev.channel = Some(msg.param(1).unwrap_or_default().to_string());
        }
        "PING" => {
            ev.kind = EventType::Ping;
            ev.content = msg.param(0).unwrap_or_default().to_string();
        }
        "PONG" => {
            ev.kind = EventType::Pong;
            ev.content = msg.params.last().cloned().unwrap_or_default();
        }
        "ACCOUNT" => {
            ev.kind = EventType::Account;
            ev.aux = msg.param(0).unwrap_or_default().to_string();
        }
        "ERROR" => {
            ev.kind = EventType::ServerError;
            ev.content = msg.param(0).unwrap_or_default().to_string();
        }
        _ => {
            ev.kind = EventType::Unknown;
            ev.content = msg.params.last().cloned().unwrap_or_default();
        }
    }

    ev
}
