//! Core data model types: addresses, decoded messages, and forms.

pub mod address;
pub mod form;
pub mod message;
