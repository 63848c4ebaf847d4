//! Subject-line codec.
//!
//! Packet messages pack routing metadata into the subject line:
//!
//! ```text
//! MSGID_[SEVERITY/]HANDLING_[FORMTAG_]SUBJECT
//! AAA-111P_O/R_ICS213_Hello, World
//! ```

use serde::{Deserialize, Serialize};

/// Message severity (a legacy field, still accepted on decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Emergency,
    Urgent,
    Other,
    /// A code outside the standard set, preserved verbatim.
    Unknown(char),
}

impl Severity {
    pub fn from_code(code: char) -> Self {
        match code {
            'E' => Self::Emergency,
            'U' => Self::Urgent,
            'O' => Self::Other,
            other => Self::Unknown(other),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EMERGENCY" => Some(Self::Emergency),
            "URGENT" => Some(Self::Urgent),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Emergency => 'E',
            Self::Urgent => 'U',
            Self::Other => 'O',
            Self::Unknown(c) => c,
        }
    }

    /// Canonical name; unknown codes have none.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Emergency => Some("EMERGENCY"),
            Self::Urgent => Some("URGENT"),
            Self::Other => Some("OTHER"),
            Self::Unknown(_) => None,
        }
    }
}

/// Handling order: how quickly the recipient must act on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlingOrder {
    Immediate,
    Priority,
    Routine,
    Unknown(char),
}

impl HandlingOrder {
    pub fn from_code(code: char) -> Self {
        match code {
            'I' => Self::Immediate,
            'P' => Self::Priority,
            'R' => Self::Routine,
            other => Self::Unknown(other),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "IMMEDIATE" => Some(Self::Immediate),
            "PRIORITY" => Some(Self::Priority),
            "ROUTINE" => Some(Self::Routine),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Immediate => 'I',
            Self::Priority => 'P',
            Self::Routine => 'R',
            Self::Unknown(c) => c,
        }
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Immediate => Some("IMMEDIATE"),
            Self::Priority => Some("PRIORITY"),
            Self::Routine => Some("ROUTINE"),
            Self::Unknown(_) => None,
        }
    }
}

/// The decomposed parts of a subject line.
///
/// When the line does not follow the grammar, only `subject` is set (to the
/// whole line).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectParts {
    pub origin_msg_id: String,
    pub severity_code: Option<char>,
    pub handling_code: Option<char>,
    pub form_tag: Option<String>,
    pub subject: String,
}

impl SubjectParts {
    /// Parts for a subject with no routing metadata.
    pub fn bare(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity_code.map(Severity::from_code)
    }

    pub fn handling(&self) -> Option<HandlingOrder> {
        self.handling_code.map(HandlingOrder::from_code)
    }

    fn has_metadata(&self) -> bool {
        !self.origin_msg_id.is_empty()
            || self.severity_code.is_some()
            || self.handling_code.is_some()
            || self.form_tag.is_some()
    }
}

/// Split a subject line into its parts.
///
/// Never fails: a line that does not match the grammar becomes the subject.
pub fn decode(line: &str) -> SubjectParts {
    parse(line).unwrap_or_else(|| SubjectParts::bare(line))
}

fn parse(line: &str) -> Option<SubjectParts> {
    let (msg_id, rest) = line.split_once('_')?;
    if !is_message_id(msg_id) {
        return None;
    }

    let mut chars = rest.chars();
    let first = chars.next().filter(char::is_ascii_alphabetic)?;
    let (severity_code, handling_code, rest) = match chars.next()? {
        '/' => {
            let handling = chars.next().filter(char::is_ascii_alphabetic)?;
            if chars.next()? != '_' {
                return None;
            }
            (Some(first), handling, chars.as_str())
        }
        '_' => (None, first, chars.as_str()),
        _ => return None,
    };

    let (form_tag, subject) = split_form_tag(rest);
    if subject.is_empty() {
        return None;
    }

    Some(SubjectParts {
        origin_msg_id: msg_id.to_string(),
        severity_code,
        handling_code: Some(handling_code),
        form_tag: form_tag.map(String::from),
        subject: subject.to_string(),
    })
}

/// Peel an optional `FORMTAG_` off the front of the remaining text.
///
/// The tag is a run without underscores or whitespace, and something must
/// remain after it to serve as the subject.
fn split_form_tag(rest: &str) -> (Option<&str>, &str) {
    if let Some((tag, subject)) = rest.split_once('_') {
        if !tag.is_empty() && !tag.chars().any(char::is_whitespace) && !subject.is_empty() {
            return (Some(tag), subject);
        }
    }
    (None, rest)
}

/// Message IDs look like `AAA-111P`, `6DM-1234`, or `XSC123`.
fn is_message_id(id: &str) -> bool {
    if !id.is_ascii() {
        return false;
    }
    if let Some((prefix, number)) = id.split_once('-') {
        return !prefix.is_empty()
            && prefix.bytes().all(|b| b.is_ascii_alphanumeric())
            && is_number_with_suffix(number);
    }
    // Without a dash, `[A-Z0-9]+[0-9]+[A-Z]?` needs at least two characters
    // before the optional suffix letter, the last of them a digit.
    let core = id
        .strip_suffix(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(id);
    core.len() >= 2
        && core.bytes().all(|b| b.is_ascii_alphanumeric())
        && core.bytes().last().is_some_and(|b| b.is_ascii_digit())
}

fn is_number_with_suffix(s: &str) -> bool {
    let digits = s
        .strip_suffix(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Build a subject line from its parts.
///
/// Parts without any routing metadata produce just the subject text.
pub fn encode(parts: &SubjectParts) -> String {
    if !parts.has_metadata() {
        return parts.subject.clone();
    }
    let mut line = String::with_capacity(parts.subject.len() + 32);
    line.push_str(&parts.origin_msg_id);
    line.push('_');
    if let Some(severity) = parts.severity_code {
        line.push(severity);
        line.push('/');
    }
    if let Some(handling) = parts.handling_code {
        line.push(handling);
    }
    line.push('_');
    if let Some(tag) = &parts.form_tag {
        line.push_str(tag);
        line.push('_');
    }
    line.push_str(&parts.subject);
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_handling_only() {
        let parts = decode("AAA-111P_R_Hello, World");
        assert_eq!(parts.origin_msg_id, "AAA-111P");
        assert_eq!(parts.severity_code, None);
        assert_eq!(parts.handling_code, Some('R'));
        assert_eq!(parts.form_tag, None);
        assert_eq!(parts.subject, "Hello, World");
    }

    #[test]
    fn test_decode_with_severity() {
        let parts = decode("AAA-111P_O/R_Hello, World");
        assert_eq!(parts.origin_msg_id, "AAA-111P");
        assert_eq!(parts.severity_code, Some('O'));
        assert_eq!(parts.handling_code, Some('R'));
        assert_eq!(parts.subject, "Hello, World");
        assert_eq!(parts.severity(), Some(Severity::Other));
        assert_eq!(parts.handling(), Some(HandlingOrder::Routine));
    }

    #[test]
    fn test_decode_with_form_tag() {
        let parts = decode("AAA-111P_R_FTag_Subject");
        assert_eq!(parts.origin_msg_id, "AAA-111P");
        assert_eq!(parts.handling_code, Some('R'));
        assert_eq!(parts.form_tag.as_deref(), Some("FTag"));
        assert_eq!(parts.subject, "Subject");
    }

    #[test]
    fn test_decode_no_underscore() {
        let parts = decode("Just a subject");
        assert_eq!(parts, SubjectParts::bare("Just a subject"));
    }

    #[test]
    fn test_decode_case_insensitive_and_unknown_codes() {
        let parts = decode("xsc123_x/q_hello");
        assert_eq!(parts.origin_msg_id, "xsc123");
        assert_eq!(parts.severity(), Some(Severity::Unknown('x')));
        assert_eq!(parts.handling(), Some(HandlingOrder::Unknown('q')));
        assert_eq!(parts.subject, "hello");
    }

    #[test]
    fn test_decode_rejects_bad_message_ids() {
        for line in ["A_R_x", "-1_R_x", "AB-_R_x", "AB-12XY_R_x", "A B1_R_x"] {
            assert_eq!(decode(line), SubjectParts::bare(line), "{line}");
        }
        assert_eq!(decode("6DM-1234_R_x").origin_msg_id, "6DM-1234");
        assert_eq!(decode("A1_R_x").origin_msg_id, "A1");
        assert_eq!(decode("A1B_R_x").origin_msg_id, "A1B");
    }

    #[test]
    fn test_decode_requires_subject() {
        assert_eq!(decode("AAA-111P_R_"), SubjectParts::bare("AAA-111P_R_"));
    }

    #[test]
    fn test_form_tag_needs_following_subject() {
        let parts = decode("AAA-111P_R_Tag_");
        assert_eq!(parts.form_tag, None);
        assert_eq!(parts.subject, "Tag_");

        let parts = decode("AAA-111P_R_two words_x");
        assert_eq!(parts.form_tag, None);
        assert_eq!(parts.subject, "two words_x");
    }

    #[test]
    fn test_encode() {
        let parts = SubjectParts {
            origin_msg_id: "AAA-111P".into(),
            severity_code: Some('O'),
            handling_code: Some('R'),
            form_tag: Some("ICS213".into()),
            subject: "Hello".into(),
        };
        assert_eq!(encode(&parts), "AAA-111P_O/R_ICS213_Hello");
        assert_eq!(decode(&encode(&parts)), parts);
    }

    #[test]
    fn test_encode_bare() {
        assert_eq!(encode(&SubjectParts::bare("Hello")), "Hello");
    }

    #[test]
    fn test_code_names() {
        assert_eq!(HandlingOrder::from_name("IMMEDIATE"), Some(HandlingOrder::Immediate));
        assert_eq!(HandlingOrder::Priority.code(), 'P');
        assert_eq!(Severity::from_code('E').name(), Some("EMERGENCY"));
        assert_eq!(Severity::Unknown('z').name(), None);
        assert_eq!(Severity::from_name("bogus"), None);
    }
}
