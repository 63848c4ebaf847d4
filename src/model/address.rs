//! Email address parsing (RFC 5322 §3.4) and amateur-radio call sign extraction.

/// A parsed email address.
///
/// # Examples
/// - `"Jim Smith <kc6rsc@w1xsc.ampr.org>"` → `display_name = "Jim Smith"`, `address = "kc6rsc@w1xsc.ampr.org"`
/// - `"kc6rsc@w1xsc.ampr.org"` → `display_name = ""`, `address = "kc6rsc@w1xsc.ampr.org"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single email address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"user@domain.com (Display Name)"`
    ///
    /// Parenthesized comments are removed; a comment stands in for a missing
    /// display name. If parsing fails, the raw string is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let (stripped, comment) = strip_comments(raw);
        let mut addr = Self::parse_uncommented(&stripped);
        if addr.display_name.is_empty() && !addr.address.is_empty() {
            addr.display_name = comment;
        }
        addr
    }

    fn parse_uncommented(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self {
                display_name: String::new(),
                address: String::new(),
            };
        }

        // Try "Display Name <address>" or "<address>"
        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let name_part = trimmed[..angle_start].trim();
                    let display_name = strip_quotes(name_part);
                    return Self {
                        display_name,
                        address: addr,
                    };
                }
            }
        }

        // Bare address, or a bare BBS-local name such as "kc6rsc"
        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut comment_depth = 0usize;

        for ch in raw.chars() {
            match ch {
                '(' if !in_quotes => {
                    comment_depth += 1;
                    current.push(ch);
                }
                ')' if !in_quotes && comment_depth > 0 => {
                    comment_depth -= 1;
                    current.push(ch);
                }
                _ if comment_depth > 0 => current.push(ch),
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    let addr = Self::parse(&current);
                    if !addr.address.is_empty() {
                        results.push(addr);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        // Last segment
        let addr = Self::parse(&current);
        if !addr.address.is_empty() {
            results.push(addr);
        }

        results
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

// ── Call signs ──────────────────────────────────────────────────

/// Length of the call sign at the start of `s`, if there is one.
///
/// A call sign is `[AKNW][A-Z]?[0-9][A-Z]{1,3}` (any case), and it must be
/// followed by `@`, `%`, or the end of the string.
fn call_sign_len(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    if !matches!(b.first()?.to_ascii_uppercase(), b'A' | b'K' | b'N' | b'W') {
        return None;
    }
    let mut i = 1;
    if b.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
        i += 1;
    }
    if !b.get(i)?.is_ascii_digit() {
        return None;
    }
    i += 1;
    let suffix = i;
    while i < b.len() && i - suffix < 3 && b[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == suffix {
        return None;
    }
    match b.get(i) {
        None | Some(b'@') | Some(b'%') => Some(i),
        _ => None,
    }
}

/// Whether `s` is exactly one call sign.
pub fn is_call_sign(s: &str) -> bool {
    call_sign_len(s) == Some(s.len())
}

/// The sender's call sign, taken from the local part of a return address.
///
/// `"kc6rsc@w1xsc.ampr.org"` → `"KC6RSC"`.
pub fn from_call_sign(address: &str) -> Option<String> {
    call_sign_len(address).map(|len| address[..len].to_uppercase())
}

/// The sender's BBS, taken from the domain of a return address.
///
/// Source-routed addresses (`kg6kzz%n0ary.#nca.ca.usa.noam@w2xsc.ampr.org`)
/// name the BBS between the `%` and the `@`. A hierarchical `.#…` suffix and
/// a trailing `.ampr.org` are dropped; what remains must be a call sign.
pub fn from_bbs(address: &str) -> Option<String> {
    let at = address.find('@')?;
    let mut domain = match address[..at].find('%') {
        Some(percent) => &address[percent + 1..at],
        None => &address[at + 1..],
    };
    if let Some(dothash) = domain.find(".#") {
        domain = &domain[..dothash];
    }
    if let Some(stripped) = domain.strip_suffix(".ampr.org") {
        domain = stripped;
    }
    call_sign_len(domain).map(|_| domain.to_uppercase())
}

/// Remove RFC 5322 comments (`(...)`, nestable, outside quoted strings).
///
/// Returns the remaining text and the text of the first comment.
fn strip_comments(raw: &str) -> (String, String) {
    let mut out = String::with_capacity(raw.len());
    let mut first_comment = None;
    let mut comment = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if depth > 0 => {
                if let Some(escaped) = chars.next() {
                    comment.push(escaped);
                }
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(ch);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if first_comment.is_none() {
                        first_comment = Some(comment.trim().to_string());
                    }
                    comment.clear();
                    out.push(' ');
                } else {
                    comment.push(ch);
                }
            }
            _ if depth > 0 => comment.push(ch),
            '"' => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    (out, first_comment.unwrap_or_default())
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
