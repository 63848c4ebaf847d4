//! Packet-specific encodings layered on top of plain email: Outpost body
//! flags, structured subject lines, and PIFO forms.

pub mod outpost;
pub mod pifo;
pub mod subject;
