//! PackItForms (PIFO) form encoding.
//!
//! A form travels in the message body as:
//!
//! ```text
//! !SCCoPIFO!
//! #T: form-ics213.html
//! #V: 3.9-2.2
//! MsgNo: [XSC-123P]
//! 10.: [Hello, `]world`]]
//! !/ADDON!
//! ```
//!
//! Values are bracketed. Inside the brackets `\\` is a backslash, `\n` is a
//! newline, `` `] `` is a literal `]`, and `` `]]] `` is a literal backtick
//! that also closes the value. Bare newlines inside a value are line-wrap
//! artifacts and are dropped.

use tracing::debug;

use crate::error::{PktMsgError, Result};
use crate::model::form::{TaggedFields, TaggedForm};

const HEADER: &str = "!SCCoPIFO!\n";
const FOOTER: &str = "!/ADDON!\n";
const MAX_LINE: usize = 128;

/// Position of the `!SCCoPIFO!` line in `body`, if it starts a line.
pub fn find_header(body: &str) -> Option<usize> {
    if body.starts_with(HEADER) {
        return Some(0);
    }
    body.find("\n!SCCoPIFO!\n").map(|idx| idx + 1)
}

/// Whether `body` contains a PIFO header line at a line boundary.
pub fn has_header(body: &str) -> bool {
    find_header(body).is_some()
}

/// Decode a PIFO form from a message body.
pub fn decode(body: &str) -> Result<TaggedForm> {
    // Header block
    let start = find_header(body)
        .ok_or_else(|| PktMsgError::InvalidFormHeader("no !SCCoPIFO! line".into()))?;
    let mut form = TaggedForm {
        text_before: body[..start].to_string(),
        ..TaggedForm::default()
    };
    let mut rest = &body[start + HEADER.len()..];

    let (html, after) = header_line(rest, "#T: ")?;
    if !is_html_ident(html) {
        return Err(PktMsgError::InvalidFormHeader(format!(
            "bad form identifier {html:?}"
        )));
    }
    form.html_ident = html.to_string();
    rest = after;

    let (versions, after) = header_line(rest, "#V: ")?;
    let (pifo_version, form_version) = versions
        .split_once('-')
        .filter(|(p, f)| is_version(p) && is_version(f))
        .ok_or_else(|| {
            PktMsgError::InvalidFormHeader(format!("bad version line {versions:?}"))
        })?;
    form.pifo_version = pifo_version.to_string();
    form.form_version = form_version.to_string();
    rest = after;

    // Fields. Blank lines between them are skipped: JNOS inserts line
    // breaks in odd places.
    let mut fields = TaggedFields::new();
    loop {
        rest = rest.trim_start_matches('\n');
        let Some(tag_len) = field_tag_len(rest) else {
            break;
        };
        let tag = &rest[..tag_len];
        let (value, after) = bracketed_value(tag, &rest[tag_len + 3..])?;
        fields.insert(tag, value)?;
        rest = after;
    }
    form.fields = fields;

    // Footer
    form.text_after = rest
        .strip_prefix(FOOTER)
        .ok_or(PktMsgError::MissingFooter)?
        .to_string();

    debug!(
        html = %form.html_ident,
        fields = form.fields.len(),
        "Decoded PIFO form"
    );
    Ok(form)
}

/// Split one `prefix<value>\n` header line off the front of `text`.
fn header_line<'a>(text: &'a str, prefix: &str) -> Result<(&'a str, &'a str)> {
    let missing = || PktMsgError::InvalidFormHeader(format!("expected {:?} line", prefix.trim()));
    let after_prefix = text.strip_prefix(prefix).ok_or_else(missing)?;
    let (value, rest) = after_prefix.split_once('\n').ok_or_else(missing)?;
    Ok((value, rest))
}

/// `[a-z][-a-z0-9]+\.html`
fn is_html_ident(s: &str) -> bool {
    let Some(stem) = s.strip_suffix(".html") else {
        return false;
    };
    let b = stem.as_bytes();
    b.len() >= 2
        && b[0].is_ascii_lowercase()
        && b[1..]
            .iter()
            .all(|&c| c == b'-' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// `\d+(\.\d+)*`
fn is_version(s: &str) -> bool {
    s.split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Length of the tag if `text` starts with a field line `TAG: [`.
///
/// Tags are `[A-Za-z0-9][-A-Za-z0-9.]*`.
fn field_tag_len(text: &str) -> Option<usize> {
    let b = text.as_bytes();
    if !b.first()?.is_ascii_alphanumeric() {
        return None;
    }
    let len = b
        .iter()
        .position(|&c| !(c.is_ascii_alphanumeric() || c == b'-' || c == b'.'))
        .unwrap_or(b.len());
    text[len..].starts_with(": [").then_some(len)
}

/// Consume a bracketed value whose opening `[` has already been read.
///
/// Returns the unescaped value and the text after the closing bracket's
/// mandatory newline.
fn bracketed_value<'a>(tag: &str, text: &'a str) -> Result<(String, &'a str)> {
    let mut value = String::new();
    let mut chars = text.char_indices();

    // Next character that is not a line-wrap newline.
    fn next_significant(chars: &mut std::str::CharIndices<'_>) -> Option<(usize, char)> {
        chars.find(|&(_, c)| c != '\n')
    }

    let end = loop {
        let Some((idx, c)) = next_significant(&mut chars) else {
            return Err(PktMsgError::UnterminatedValue(tag.to_string()));
        };
        match c {
            ']' => break idx + 1,
            '\\' => {
                let mut lookahead = chars.clone();
                match next_significant(&mut lookahead) {
                    Some((_, '\\')) => {
                        value.push('\\');
                        chars = lookahead;
                    }
                    Some((_, 'n')) => {
                        value.push('\n');
                        chars = lookahead;
                    }
                    _ => value.push('\\'),
                }
            }
            '`' => {
                let mut lookahead = chars.clone();
                match next_significant(&mut lookahead) {
                    Some((_, ']')) => {
                        let mut closing = lookahead.clone();
                        let two = next_significant(&mut closing);
                        let three = next_significant(&mut closing);
                        if let (Some((_, ']')), Some((last, ']'))) = (two, three) {
                            value.push('`');
                            break last + 1;
                        }
                        value.push(']');
                        chars = lookahead;
                    }
                    _ => value.push('`'),
                }
            }
            other => value.push(other),
        }
    };

    let after = &text[end..];
    match after.strip_prefix('\n') {
        Some(rest) => Ok((value, rest)),
        None if after.is_empty() => Err(PktMsgError::UnterminatedValue(tag.to_string())),
        None => Err(PktMsgError::TrailingGarbage(tag.to_string())),
    }
}

/// Encode a form as a PIFO block, including any surrounding text.
///
/// Fields are written in the order they appear in `form.fields`; empty
/// values are omitted.
pub fn encode(form: &TaggedForm) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&form.text_before);
    out.push_str(HEADER);
    out.push_str("#T: ");
    out.push_str(&form.html_ident);
    out.push_str("\n#V: ");
    out.push_str(&form.pifo_version);
    out.push('-');
    out.push_str(&form.form_version);
    out.push('\n');
    for (tag, value) in form.fields.iter() {
        if value.is_empty() {
            continue;
        }
        let line = format!("{tag}: [{}]", escape_value(value));
        push_wrapped(&mut out, &line);
    }
    out.push_str(FOOTER);
    out.push_str(&form.text_after);
    out
}

fn escape_value(value: &str) -> String {
    let mut escaped = value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(']', "`]");
    if escaped.ends_with('`') {
        escaped.push_str("]]");
    }
    escaped
}

/// Append `line` in chunks of at most 128 bytes, each ending in a newline.
fn push_wrapped(out: &mut String, mut line: &str) {
    while line.len() > MAX_LINE {
        let mut split = MAX_LINE;
        while !line.is_char_boundary(split) {
            split -= 1;
        }
        out.push_str(&line[..split]);
        out.push('\n');
        line = &line[split..];
    }
    out.push_str(line);
    out.push('\n');
}
