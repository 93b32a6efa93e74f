//! # wintermute-proto
//!
//! IRC line-level parsing for the wintermute bot engine.
//!
//! ## Features
//!
//! - IRC message parsing (tags, source prefix, command, parameters)
//! - RFC 1459 case mapping and case-insensitive comparison
//! - Hostmask wildcard matching
//! - The numeric reply constants the client side cares about
//!
//! Parse failures carry the partially assembled [`Message`] so callers
//! can log something more useful than the raw line alone.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod error;
pub mod hostmask;
pub mod message;
pub mod numeric;
pub mod source;

pub use self::casemap::{irc_eq, irc_lower_byte, irc_to_lower};
pub use self::error::ProtoError;
pub use self::hostmask::{matches_hostmask, wildcard_match};
pub use self::message::Message;
pub use self::source::Source;
