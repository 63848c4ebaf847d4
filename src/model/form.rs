//! Form data carried in a PackItForms (PIFO) block.

use serde::{Deserialize, Serialize};

use crate::error::{PktMsgError, Result};

/// Ordered map of form field tags to values.
///
/// Tags are unique and keep their insertion order, so a decoded form
/// re-encodes with its fields in the order they arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<(String, String)>",
    into = "Vec<(String, String)>"
)]
pub struct TaggedFields {
    entries: Vec<(String, String)>,
}

impl TryFrom<Vec<(String, String)>> for TaggedFields {
    type Error = PktMsgError;

    fn try_from(entries: Vec<(String, String)>) -> Result<Self> {
        let mut fields = Self::new();
        for (tag, value) in entries {
            fields.insert(tag, value)?;
        }
        Ok(fields)
    }
}

impl From<TaggedFields> for Vec<(String, String)> {
    fn from(fields: TaggedFields) -> Self {
        fields.entries
    }
}

impl TaggedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Add a field that must not already be present.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let tag = tag.into();
        if self.contains(&tag) {
            return Err(PktMsgError::DuplicateTag(tag));
        }
        self.entries.push((tag, value.into()));
        Ok(())
    }

    /// Set a field, replacing any existing value in place.
    ///
    /// An empty value removes the field: empty fields are never transmitted.
    pub fn set(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        let tag = tag.into();
        let value = value.into();
        let existing = self.entries.iter().position(|(t, _)| *t == tag);
        match (existing, value.is_empty()) {
            (Some(idx), true) => {
                self.entries.remove(idx);
            }
            (Some(idx), false) => self.entries[idx].1 = value,
            (None, true) => {}
            (None, false) => self.entries.push((tag, value)),
        }
    }

    pub fn remove(&mut self, tag: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(t, _)| t == tag)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.iter().any(|(t, _)| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TaggedFields {
    /// Later duplicates overwrite earlier ones, keeping the first position.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (tag, value) in iter {
            fields.set(tag, value);
        }
        fields
    }
}

/// A decoded (or to-be-encoded) PIFO form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedForm {
    /// Name of the PackItForms HTML file that renders the form, e.g. `form-ics213.html`.
    pub html_ident: String,
    /// Version of the PackItForms encoding.
    pub pifo_version: String,
    /// Version of the form itself.
    pub form_version: String,
    pub fields: TaggedFields,
    /// Text preceding the `!SCCoPIFO!` line (BBS banners and the like).
    pub text_before: String,
    /// Text following the `!/ADDON!` line.
    pub text_after: String,
}

impl TaggedForm {
    pub fn new(
        html_ident: impl Into<String>,
        pifo_version: impl Into<String>,
        form_version: impl Into<String>,
    ) -> Self {
        Self {
            html_ident: html_ident.into(),
            pifo_version: pifo_version.into(),
            form_version: form_version.into(),
            ..Self::default()
        }
    }

    /// The known form type this form is an instance of, if any.
    pub fn kind(&self) -> Option<FormKind> {
        FormKind::from_html_ident(&self.html_ident)
    }
}

/// Form types recognized by their HTML identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    /// ICS-213 general message.
    Ics213,
    /// EOC-213RR resource request.
    Eoc213rr,
    /// OA jurisdiction (municipal) status.
    JurisStat,
    /// OA shelter status.
    SheltStat,
    /// Allied health facility status.
    AhFacStat,
    /// RACES mutual aid request.
    RacesMar,
}

const FORM_TABLE: &[(&str, FormKind)] = &[
    ("form-ics213.html", FormKind::Ics213),
    ("form-scco-eoc-213rr.html", FormKind::Eoc213rr),
    ("form-oa-muni-status.html", FormKind::JurisStat),
    ("form-oa-shelter-status.html", FormKind::SheltStat),
    ("form-allied-health-facility-status.html", FormKind::AhFacStat),
    ("form-oa-mutual-aid-request.html", FormKind::RacesMar),
    ("form-oa-mutual-aid-request-v2.html", FormKind::RacesMar),
];

impl FormKind {
    pub const ALL: [FormKind; 6] = [
        Self::Ics213,
        Self::Eoc213rr,
        Self::JurisStat,
        Self::SheltStat,
        Self::AhFacStat,
        Self::RacesMar,
    ];

    pub fn from_html_ident(html: &str) -> Option<Self> {
        FORM_TABLE
            .iter()
            .find(|(ident, _)| *ident == html)
            .map(|(_, kind)| *kind)
    }

    /// The form tag used in subject lines of this form type.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Ics213 => "ICS213",
            Self::Eoc213rr => "EOC213RR",
            Self::JurisStat => "JurisStat",
            Self::SheltStat => "SheltStat",
            Self::AhFacStat => "AHFacStat",
            Self::RacesMar => "RACES-MAR",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ics213 => "ICS-213 general message form",
            Self::Eoc213rr => "EOC-213RR resource request form",
            Self::JurisStat => "OA jurisdiction status form",
            Self::SheltStat => "OA shelter status form",
            Self::AhFacStat => "allied health facility status form",
            Self::RacesMar => "RACES mutual aid request form",
        }
    }

    /// The HTML identifier new forms of this type are written with.
    pub fn html_ident(self) -> &'static str {
        FORM_TABLE
            .iter()
            .rev()
            .find(|(_, kind)| *kind == self)
            .map(|(ident, _)| *ident)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
