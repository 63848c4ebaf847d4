//! MIME body handling: transfer encodings, Content-Type, and the multipart
//! walk that finds the plain-text body of a message.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::error::{PktMsgError, Result};
use crate::model::message::PlainBody;
use crate::parser::header::{decode_raw_bytes, read_headers, Headers};

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Extract the plain-text body of a message.
///
/// Quoted-printable and base64 content is decoded, but marks the result as
/// not fully plain text, as does any multipart structure. Of the parts of a
/// multipart body, the last one with non-empty plain text wins. The charset
/// parameter is not interpreted.
pub fn extract_plain_text(headers: &Headers, body: &str) -> Result<PlainBody> {
    let (text, not_plain) = extract(headers, body, 0)?;
    Ok(PlainBody {
        text: text.unwrap_or_default(),
        fully_plain_text: !not_plain,
    })
}

fn extract(headers: &Headers, body: &str, depth: usize) -> Result<(Option<String>, bool)> {
    let mut not_plain = false;
    let encoding = headers
        .get("content-transfer-encoding")
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let decoded: String = match encoding.as_str() {
        "" | "7bit" | "8bit" | "binary" => body.to_string(),
        "quoted-printable" => {
            not_plain = true;
            decode_raw_bytes(&decode_quoted_printable(body)?)
        }
        "base64" => {
            not_plain = true;
            decode_raw_bytes(&decode_base64(body)?)
        }
        other => {
            debug!(encoding = other, "Unsupported transfer encoding");
            return Ok((None, true));
        }
    };

    let content_type = match headers.get("content-type") {
        Some(value) if !value.trim().is_empty() => ContentType::parse(value)?,
        _ => ContentType::text_plain(),
    };

    if content_type.is_multipart() {
        if depth >= MAX_DEPTH {
            return Err(PktMsgError::UndecodableBody(
                "multipart nesting too deep".into(),
            ));
        }
        let boundary = content_type.param("boundary").ok_or_else(|| {
            PktMsgError::UndecodableBody("multipart body without boundary".into())
        })?;
        let mut found = None;
        for part in split_multipart(&decoded, boundary)? {
            let (part_headers, part_body) = if part.is_empty() {
                (Headers::new(), "")
            } else {
                read_headers(part).map_err(|e| {
                    PktMsgError::UndecodableBody(format!("bad multipart part headers: {e}"))
                })?
            };
            let (plain, _) = extract(&part_headers, part_body, depth + 1)?;
            if let Some(text) = plain.filter(|t| !t.is_empty()) {
                found = Some(text);
            }
        }
        return Ok((found, true));
    }

    if content_type.media_type != "text/plain" {
        debug!(media_type = %content_type.media_type, "Skipping non-plain body");
        return Ok((None, true));
    }
    Ok((Some(decoded), not_plain))
}

// ── Content-Type ────────────────────────────────────────────────

/// A parsed Content-Type header (RFC 2045 §5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub media_type: String,
    /// Parameters in header order, names lowercased.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    fn text_plain() -> Self {
        Self {
            media_type: "text/plain".into(),
            params: Vec::new(),
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse a Content-Type value. Anything malformed is an error.
    pub fn parse(value: &str) -> Result<Self> {
        let bad = |why: &str| PktMsgError::UndecodableBody(format!("bad Content-Type {value:?}: {why}"));
        let (type_part, mut rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        let (primary, sub) = type_part
            .trim()
            .split_once('/')
            .ok_or_else(|| bad("missing subtype"))?;
        if !is_token(primary) || !is_token(sub) {
            return Err(bad("invalid media type"));
        }
        let mut content_type = Self {
            media_type: format!("{primary}/{sub}").to_ascii_lowercase(),
            params: Vec::new(),
        };

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix(';').ok_or_else(|| bad("expected ';'"))?.trim_start();
            if rest.is_empty() {
                // Tolerate a trailing semicolon.
                break;
            }
            let eq = rest.find('=').ok_or_else(|| bad("parameter without value"))?;
            let name = rest[..eq].trim();
            if !is_token(name) {
                return Err(bad("invalid parameter name"));
            }
            rest = rest[eq + 1..].trim_start();
            let (param_value, after) = if let Some(quoted) = rest.strip_prefix('"') {
                parse_quoted(quoted).ok_or_else(|| bad("unterminated quoted string"))?
            } else {
                let end = rest
                    .find(|c: char| c == ';' || c.is_whitespace())
                    .unwrap_or(rest.len());
                let token = &rest[..end];
                if !is_token(token) {
                    return Err(bad("invalid parameter value"));
                }
                (token.to_string(), &rest[end..])
            };
            content_type
                .params
                .push((name.to_ascii_lowercase(), param_value));
            rest = after;
        }
        Ok(content_type)
    }
}

/// Parse the body of a quoted string (after the opening quote).
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &s[i + 1..])),
            '\\' => value.push(chars.next()?.1),
            other => value.push(other),
        }
    }
    None
}

/// RFC 2045 token: printable ASCII except SPACE and tspecials.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b > b' ' && b < 0x7F && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}

// ── Multipart ───────────────────────────────────────────────────

/// Split a multipart body into its raw parts (headers + body each).
///
/// The preamble and epilogue are dropped. A missing close delimiter is
/// tolerated; a body with no delimiter at all is not.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Result<Vec<&'a str>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_end();
        let Some(after) = trimmed.strip_prefix(delimiter.as_str()) else {
            continue;
        };
        let closing = match after {
            "" => false,
            "--" => true,
            _ => continue,
        };
        if let Some(start) = part_start.take() {
            parts.push(strip_line_end(&body[start..line_start.max(start)]));
        }
        if closing {
            return Ok(parts);
        }
        part_start = Some(offset);
    }

    match part_start {
        Some(start) => {
            parts.push(&body[start..]);
            Ok(parts)
        }
        None => Err(PktMsgError::UndecodableBody(format!(
            "multipart boundary {boundary:?} not found"
        ))),
    }
}

/// The line break before a delimiter belongs to the delimiter (RFC 2046 §5.1.1).
fn strip_line_end(s: &str) -> &str {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s)
}

// ── Transfer encodings ──────────────────────────────────────────

fn decode_base64(body: &str) -> Result<Vec<u8>> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PktMsgError::UndecodableBody(format!("bad base64 content: {e}")))
}

/// Decode quoted-printable content (RFC 2045 §6.7): `=XX` escapes and soft
/// line breaks (`=` at end of line).
fn decode_quoted_printable(body: &str) -> Result<Vec<u8>> {
    let src = body.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        // Soft line break, allowing trailing whitespace after the '='
        let mut j = i + 1;
        while j < src.len() && (src[j] == b' ' || src[j] == b'\t') {
            j += 1;
        }
        if j == src.len() {
            i = j;
            continue;
        }
        if src[j] == b'\n' {
            i = j + 1;
            continue;
        }
        if src[j] == b'\r' && src.get(j + 1) == Some(&b'\n') {
            i = j + 2;
            continue;
        }
        match (src.get(i + 1).and_then(hex_value), src.get(i + 2).and_then(hex_value)) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                return Err(PktMsgError::UndecodableBody(format!(
                    "bad quoted-printable escape at byte {i}"
                )))
            }
        }
    }
    Ok(out)
}

fn hex_value(b: &u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
