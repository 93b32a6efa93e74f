//! Message source (prefix) parsing.
//!
//! The prefix of an IRC line is either a server name or a full user
//! mask of the form `nick!user@host`. Servers omit the `!user@host`
//! portion and usually contain a dot.

use std::fmt;

/// The origin of an IRC message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Source {
    /// Nickname, or the server name for server-originated lines.
    pub nick: String,
    /// The ident/username part, if present.
    pub user: Option<String>,
    /// The host part, if present.
    pub host: Option<String>,
}

impl Source {
    /// Parse a prefix string (without the leading `:`).
    pub fn parse(raw: &str) -> Self {
        let (nick_part, rest) = match raw.split_once('!') {
            Some((n, r)) => (n, Some(r)),
            None => (raw, None),
        };

        match rest {
            Some(r) => {
                let (user, host) = match r.split_once('@') {
                    Some((u, h)) => (Some(u.to_string()), Some(h.to_string())),
                    None => (Some(r.to_string()), None),
                };
                Source {
                    nick: nick_part.to_string(),
                    user,
                    host,
                }
            }
            None => match nick_part.split_once('@') {
                // `nick@host` without an ident is rare but legal
                Some((n, h)) => Source {
                    nick: n.to_string(),
                    user: None,
                    host: Some(h.to_string()),
                },
                None => Source {
                    nick: nick_part.to_string(),
                    user: None,
                    host: None,
                },
            },
        }
    }

    /// Whether this source looks like a server rather than a user.
    pub fn is_server(&self) -> bool {
        self.user.is_none() && self.host.is_none() && self.nick.contains('.')
    }

    /// The full `nick!user@host` mask, with `*` for missing parts.
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            self.nick,
            self.user.as_deref().unwrap_or("*"),
            self.host.as_deref().unwrap_or("*")
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nick)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_user_mask() {
        let s = Source::parse("alice!~ada@host.example");
        assert_eq!(s.nick, "alice");
        assert_eq!(s.user.as_deref(), Some("~ada"));
        assert_eq!(s.host.as_deref(), Some("host.example"));
        assert!(!s.is_server());
        assert_eq!(s.mask(), "alice!~ada@host.example");
    }

    #[test]
    fn parses_server_name() {
        let s = Source::parse("irc.straylight.net");
        assert!(s.is_server());
        assert_eq!(s.to_string(), "irc.straylight.net");
    }

    #[test]
    fn parses_nick_at_host() {
        let s = Source::parse("bob@shell.example");
        assert_eq!(s.nick, "bob");
        assert!(s.user.is_none());
        assert_eq!(s.host.as_deref(), Some("shell.example"));
        assert_eq!(s.mask(), "bob!*@shell.example");
    }
}
