//! RFC 5322 header parsing: folding, strict header-line syntax, and date parsing.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use tracing::warn;

use crate::error::{PktMsgError, Result};

/// An ordered multimap of message headers.
///
/// Names keep the case they were written with; lookups are
/// case-insensitive. Values are unfolded and trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any earlier headers of the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` (case-insensitive), in message order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode raw message bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_raw_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Read a header block from the start of `text`.
///
/// Continuation lines (starting with space or tab) are joined to the previous
/// header. Reading stops at the first empty line, and the text after it is
/// returned as the body. Running out of input is accepted as long as at
/// least one header was read.
pub fn read_headers(text: &str) -> Result<(Headers, &str)> {
    let mut headers = Headers::new();
    let mut rest = text;

    loop {
        let (raw_line, next) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None if rest.is_empty() => {
                if headers.is_empty() {
                    return Err(PktMsgError::MalformedEnvelope(
                        "no header section".into(),
                    ));
                }
                return Ok((headers, rest));
            }
            None => (rest, ""),
        };
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        rest = next;

        if line.is_empty() {
            return Ok((headers, rest));
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            match headers.entries.last_mut() {
                Some(last) => {
                    let cont = line.trim();
                    if !cont.is_empty() {
                        if !last.1.is_empty() {
                            last.1.push(' ');
                        }
                        last.1.push_str(cont);
                    }
                }
                None => {
                    return Err(PktMsgError::MalformedEnvelope(format!(
                        "continuation line before first header: {line:?}"
                    )))
                }
            }
            continue;
        }

        let colon_pos = line.find(':').ok_or_else(|| {
            PktMsgError::MalformedEnvelope(format!("malformed header line: {line:?}"))
        })?;
        let name = &line[..colon_pos];
        if !is_header_name(name) {
            return Err(PktMsgError::MalformedEnvelope(format!(
                "malformed header name: {name:?}"
            )));
        }
        let value = line[colon_pos + 1..].trim();
        headers.push(name, value);
    }
}

/// Header field names are printable ASCII without spaces or colons (RFC 5322 §2.2).
fn is_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and the broken variants seen from BBS software.
/// Dates without a zone are taken as local time.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    // Remove leading day-of-week: "Thu, " or "Thu "
    let no_dow = strip_day_of_week(trimmed);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt);
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return local_time(ndt);
        }
    }

    // Replace named timezones with offsets and try again
    let replaced = replace_named_tz(&no_dow);
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Parse a C `ctime` timestamp (`"Mon Jan  2 15:04:05 2006"`) as local time.
///
/// BBS software writes envelope-line timestamps in local time, even though
/// RFC 4155 asks for UTC.
pub fn parse_ctime(stamp: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = stamp.split_whitespace().collect::<Vec<_>>().join(" ");
    let ndt = NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y").ok()?;
    local_time(ndt)
}

/// Parse a receipt timestamp (`"2021-01-01 00:00:00"`) as local time.
pub fn parse_receipt_time(stamp: &str) -> Option<DateTime<FixedOffset>> {
    let ndt = NaiveDateTime::parse_from_str(stamp, RECEIPT_TIME_FORMAT).ok()?;
    local_time(ndt)
}

/// `strftime` format of the timestamps carried in receipt bodies.
pub const RECEIPT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether `s` is exactly a receipt timestamp: `20\d\d-\d\d-\d\d \d\d:\d\d:\d\d`.
pub fn is_receipt_time(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 19 || !s.starts_with("20") {
        return false;
    }
    b.iter().enumerate().all(|(i, &c)| match i {
        4 | 7 => c == b'-',
        10 => c == b' ',
        13 | 16 => c == b':',
        _ => c.is_ascii_digit(),
    })
}

fn local_time(ndt: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Local
        .from_local_datetime(&ndt)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<FixedOffset>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parser = MessageParser::default();
    let parsed = parser.parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt).ok()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
