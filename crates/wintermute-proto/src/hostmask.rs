//! Hostmask wildcard matching.
//!
//! Used by the privilege resolver when a server offers no reliable
//! account information and the engine degrades to hostmask-only
//! authorization. Patterns support `*` (any run) and `?` (any single
//! character), compared under the rfc1459 case mapping.

use crate::casemap::irc_lower_byte;

/// Match `text` against a wildcard `pattern` (`*` and `?`),
/// case-insensitively under rfc1459 rules.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();

    // Iterative glob match with single-star backtracking.
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len()
            && (p[pi] == b'?' || irc_lower_byte(p[pi]) == irc_lower_byte(t[ti]))
        {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

/// Match a full `nick!user@host` mask against a ban-style pattern.
pub fn matches_hostmask(pattern: &str, mask: &str) -> bool {
    wildcard_match(pattern, mask)
}
