//! Numeric reply codes the client engine reacts to.
//!
//! Only the numerics the bot actually branches on live here; everything
//! else is surfaced as a generic numeric event.

/// `001` - registration completed.
pub const RPL_WELCOME: u16 = 1;

/// `318` - end of a WHOIS response.
pub const RPL_ENDOFWHOIS: u16 = 318;

/// `330` - WHOIS: `<nick> <account> :is logged in as`.
pub const RPL_WHOISACCOUNT: u16 = 330;

/// `376` - end of MOTD, an alternative registration-complete signal.
pub const RPL_ENDOFMOTD: u16 = 376;

/// `421` - unknown command; a run of these in response to WHOIS marks
/// a server without services support.
pub const ERR_UNKNOWNCOMMAND: u16 = 421;

/// `422` - no MOTD; treated like end of MOTD.
pub const ERR_NOMOTD: u16 = 422;

/// `432` - erroneous nickname during registration.
pub const ERR_ERRONEUSNICKNAME: u16 = 432;

/// `433` - nickname already in use.
pub const ERR_NICKNAMEINUSE: u16 = 433;
