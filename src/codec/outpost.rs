//! Outpost in-band body flags.
//!
//! Outpost marks urgency and receipt requests with short `!XXX!` tokens at the
//! start of the body, and escapes bodies it cannot send verbatim as
//! `!B64!<base64>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use crate::model::message::OutpostFlags;
use crate::parser::header::decode_raw_bytes;

const URGENT: &str = "!URG!";
const DELIVERY_RECEIPT: &str = "!RDR!";
const READ_RECEIPT: &str = "!RRR!";
const BASE64: &str = "!B64!";

/// A body with its Outpost flags stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutpostBody {
    pub flags: OutpostFlags,
    pub text: String,
    /// The body arrived inside a `!B64!` escape (or a broken one).
    pub was_base64: bool,
}

/// Strip Outpost flags from the front of `body`.
///
/// Newlines ahead of the first flag are discarded, but only if a flag is
/// actually found. A `!B64!` escape is decoded in place and the flag scan
/// continues into the decoded text, since flags are applied before the
/// escape on the sending side. A second `!B64!` is not unwrapped.
pub fn decode(body: &str) -> OutpostBody {
    let mut out = OutpostBody::default();
    let mut found = false;
    let mut rest: std::borrow::Cow<'_, str> = body.into();

    loop {
        if !found && rest.starts_with('\n') {
            let skipped = rest.trim_start_matches('\n');
            if starts_with_flag(skipped, out.was_base64) {
                rest = skipped.to_string().into();
            } else {
                break;
            }
        }

        if !out.was_base64 && rest.starts_with(BASE64) {
            found = true;
            out.was_base64 = true;
            match decode_base64(&rest[BASE64.len()..]) {
                Some(decoded) => rest = decoded.into(),
                None => {
                    warn!("Undecodable !B64! body");
                    rest = String::new().into();
                    break;
                }
            }
        } else if let Some(after) = rest.strip_prefix(URGENT) {
            out.flags.urgent = true;
            found = true;
            rest = after.to_string().into();
        } else if let Some(after) = rest.strip_prefix(DELIVERY_RECEIPT) {
            out.flags.request_delivery_receipt = true;
            found = true;
            rest = after.to_string().into();
        } else if let Some(after) = rest.strip_prefix(READ_RECEIPT) {
            out.flags.request_read_receipt = true;
            found = true;
            rest = after.to_string().into();
        } else {
            break;
        }
    }

    out.text = rest.into_owned();
    out
}

fn starts_with_flag(s: &str, base64_done: bool) -> bool {
    s.starts_with(URGENT)
        || s.starts_with(DELIVERY_RECEIPT)
        || s.starts_with(READ_RECEIPT)
        || (!base64_done && s.starts_with(BASE64))
}

fn decode_base64(payload: &str) -> Option<String> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes()).ok()?;
    Some(decode_raw_bytes(&bytes))
}

/// Whether Outpost would have to escape this text: anything outside
/// printable ASCII, tab, and newline.
pub fn needs_base64(text: &str) -> bool {
    text.bytes()
        .any(|b| b > 0x7E || (b < 0x20 && b != b'\t' && b != b'\n'))
}

/// Apply Outpost flags to `body`, escaping the result if necessary.
pub fn encode(flags: OutpostFlags, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 15);
    if flags.urgent {
        out.push_str(URGENT);
    }
    if flags.request_delivery_receipt {
        out.push_str(DELIVERY_RECEIPT);
    }
    if flags.request_read_receipt {
        out.push_str(READ_RECEIPT);
    }
    out.push_str(body);

    if needs_base64(&out) {
        format!("{BASE64}{}\n", STANDARD.encode(out.as_bytes()))
    } else {
        out
    }
}
