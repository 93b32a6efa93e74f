//! # wintermute
//!
//! An IRC client bot engine built around three ideas:
//!
//! - **Declarative routing.** Plugins describe their handlers as data
//!   ([`plugins::HandlerSpec`]) and the engine interprets the table in
//!   phase order per event.
//! - **Deferred authorization.** Privilege checks rest on services
//!   accounts; when the account is unknown the invocation parks while
//!   a rate-limited WHOIS resolves it, and replays afterwards.
//! - **Cooperative scheduling.** Handlers suspend against future
//!   events or deadlines through tokens; all state lives on one task
//!   and nothing is locked.
//!
//! The supervisor in [`net`] owns the socket, reconnects with backoff,
//! and meters every chat line through a leaky bucket.

#![deny(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod net;
pub mod plugins;
