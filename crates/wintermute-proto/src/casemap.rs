//! RFC 1459 case mapping.
//!
//! IRC nicknames and channel names compare case-insensitively with a
//! twist inherited from Scandinavian keyboards: `[]\~` are the upper-case
//! forms of `{}|^`. Every identity key in the engine goes through this
//! mapping before it is used for lookups.

/// Lower one byte under the `rfc1459` mapping.
#[inline]
pub const fn irc_lower_byte(b: u8) -> u8 {
    match b {
        b'A'..=b'Z' => b + 32,
        b'[' => b'{',
        b']' => b'}',
        b'\\' => b'|',
        b'~' => b'^',
        _ => b,
    }
}

/// Lower a whole string under the `rfc1459` mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.bytes().map(|b| irc_lower_byte(b) as char).collect()
}

/// Case-insensitive equality under the `rfc1459` mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .all(|(x, y)| irc_lower_byte(x) == irc_lower_byte(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_ascii_and_specials() {
        assert_eq!(irc_to_lower("Wintermute"), "wintermute");
        assert_eq!(irc_to_lower("NICK[1]~x\\y"), "nick{1}^x|y");
    }

    #[test]
    fn equality_ignores_case_and_specials() {
        assert!(irc_eq("Case|Test", "case\\test"));
        assert!(irc_eq("#Chan{x}", "#chan[X]"));
        assert!(!irc_eq("alice", "alicia"));
        assert!(!irc_eq("alice", "alice2"));
    }
}
