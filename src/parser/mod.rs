//! Email parsing: envelope and header reading, date parsing, and MIME
//! plain-text extraction.

pub mod envelope;
pub mod header;
pub mod mime;
