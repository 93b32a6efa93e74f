//! Text-level matching: prefix stripping and command word extraction.
//!
//! The routing walk itself lives in [`crate::engine`]; these helpers
//! decide whether a line of chat addresses the bot and, if so, which
//! part of it is arguments.

use crate::plugins::PrefixPolicy;

/// Strip the addressing form `policy` requires from `content`.
///
/// Returns the remaining text on a match. For `Prefixed`, `fallback`
/// additionally accepts the `Nickname` form (`wm: cmd` / `wm, cmd`).
pub fn strip_address<'a>(
    content: &'a str,
    policy: PrefixPolicy,
    prefix: &str,
    nickname: &str,
    fallback: bool,
) -> Option<&'a str> {
    match policy {
        PrefixPolicy::Direct => Some(content),
        PrefixPolicy::Nickname => strip_nickname(content, nickname),
        PrefixPolicy::Prefixed => {
            if let Some(rest) = content.strip_prefix(prefix) {
                Some(rest)
            } else if fallback {
                strip_nickname(content, nickname)
            } else {
                None
            }
        }
    }
}

fn strip_nickname<'a>(content: &'a str, nickname: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(nickname)?;
    let rest = rest.strip_prefix([':', ','])?;
    Some(rest.trim_start())
}

/// Match the leading command word case-insensitively; returns the
/// argument remainder with leading whitespace removed.
pub fn match_command<'a>(stripped: &'a str, word: &str) -> Option<&'a str> {
    let stripped = stripped.trim_start();
    let (first, rest) = match stripped.split_once(char::is_whitespace) {
        Some((f, r)) => (f, r),
        None => (stripped, ""),
    };
    if first.eq_ignore_ascii_case(word) {
        Some(rest.trim_start())
    } else {
        None
    }
}
