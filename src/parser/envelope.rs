//! Envelope reader: the RFC 4155 `From ` line and the headers that say who
//! sent a message and when it arrived.

use chrono::DateTime;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::address::EmailAddress;
use crate::model::message::{Envelope, Retrieval};
use crate::parser::header::{parse_ctime, parse_date, read_headers, Headers};

/// Host name used in our `Received:` stamps.
const LOCAL_HOST: &str = "pktmsg.local";

/// `strftime` form of RFC 1123 with a numeric zone.
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Split the envelope and headers off a raw message.
///
/// Returns the envelope and the (still encoded) body text. Fails only when
/// the headers cannot be parsed at all.
pub fn read_envelope(raw: &str) -> Result<(Envelope, &str)> {
    let mut text = raw;
    let mut envelope_line = None;
    if raw.starts_with("From ") {
        if let Some(idx) = raw.find('\n') {
            let line = &raw[..idx];
            envelope_line = Some(line.strip_suffix('\r').unwrap_or(line));
            text = &raw[idx + 1..];
        }
    }

    let (headers, body) = read_headers(text)?;
    let mut env = Envelope {
        from: first_address(&headers, "from")
            .map(|a| a.display())
            .unwrap_or_default(),
        to: ["to", "cc", "bcc"]
            .iter()
            .flat_map(|name| headers.get_all(name).collect::<Vec<_>>())
            .flat_map(EmailAddress::parse_list)
            .map(|a| a.address)
            .collect(),
        subject_line: headers.get("subject").unwrap_or_default().to_string(),
        sent_date: headers.get("date").and_then(parse_date),
        retrieval: headers.get("received").and_then(parse_received_stamp),
        ..Envelope::default()
    };

    match envelope_line {
        Some(line) => {
            let rest = &line["From ".len()..];
            let (addr, stamp) = rest.split_once(' ').unwrap_or((rest, ""));
            env.return_address = addr.to_string();
            env.autoresponse = addr.is_empty();
            if !stamp.trim().is_empty() {
                env.delivery_time = parse_ctime(stamp);
                if env.delivery_time.is_none() {
                    warn!(stamp, "Unparseable envelope timestamp");
                }
            }
        }
        None => env.return_address = return_address(&headers),
    }

    if env.delivery_time.is_none() {
        env.delivery_time = headers
            .get("received")
            .and_then(|r| r.rsplit_once(';'))
            .and_then(|(_, date)| parse_date(date));
    }

    debug!(
        return_address = %env.return_address,
        autoresponse = env.autoresponse,
        headers = headers.len(),
        "Read envelope"
    );
    env.headers = headers;
    Ok((env, body))
}

/// First address of the first of `Return-Path`, `Reply-To`, `Sender`, and
/// `From` that has a value.
fn return_address(headers: &Headers) -> String {
    ["return-path", "reply-to", "sender", "from"]
        .iter()
        .find(|name| headers.get(name).is_some_and(|v| !v.is_empty()))
        .and_then(|name| first_address(headers, name))
        .map(|a| a.address)
        .unwrap_or_default()
}

fn first_address(headers: &Headers, name: &str) -> Option<EmailAddress> {
    EmailAddress::parse_list(headers.get(name)?).into_iter().next()
}

// ── Saved-message Received: stamp ───────────────────────────────

/// Parse the value of a `Received:` header we wrote when saving a message:
/// `FROM <bbs>.ampr.org BY pktmsg.local[ FOR <area>]; <date>`.
pub fn parse_received_stamp(value: &str) -> Option<Retrieval> {
    let rest = value.strip_prefix("FROM ")?;
    let (host, rest) = rest.split_once(' ')?;
    let bbs = host.strip_suffix(".ampr.org").filter(|b| !b.is_empty())?;
    let rest = rest.strip_prefix("BY ")?.strip_prefix(LOCAL_HOST)?;
    let (area, date) = rest.split_once(';')?;
    let area = match area {
        "" => None,
        a => {
            let name = a.strip_prefix(" FOR ")?;
            if name.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            Some(name.to_string())
        }
    };
    let date = DateTime::parse_from_rfc2822(date.trim()).ok()?;
    Some(Retrieval {
        bbs: bbs.to_string(),
        area,
        date,
    })
}

/// Render a `Received:` header line (with trailing newline) for a saved message.
///
/// With a bulletin area the header is folded after the semicolon.
pub fn render_received_stamp(retrieval: &Retrieval) -> String {
    let date = retrieval.date.format(RFC1123Z);
    match &retrieval.area {
        Some(area) => format!(
            "Received: FROM {}.ampr.org BY {LOCAL_HOST} FOR {area};\n\t{date}\n",
            retrieval.bbs
        ),
        None => format!(
            "Received: FROM {}.ampr.org BY {LOCAL_HOST}; {date}\n",
            retrieval.bbs
        ),
    }
}
