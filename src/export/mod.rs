//! Outgoing side: message composition, transmission, and saved rendering.

pub mod message;
