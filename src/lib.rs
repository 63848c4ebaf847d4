//! `pktmsg` — decoding and encoding of packet-radio email messages.
//!
//! Messages exchanged over amateur packet radio BBSes are RFC 5322 email
//! with extra conventions layered on top: Outpost body flags, a structured
//! subject line, and PIFO-encoded forms. [`classify`] turns raw message text
//! into its most specific interpretation; [`export::message`] goes the other
//! way.

pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use classify::classify;
