//! Decoded packet messages and the pieces they are built from.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::codec::subject::SubjectParts;
use crate::model::form::{FormKind, TaggedForm};
use crate::parser::header::Headers;

/// The flags Outpost carries in front of a message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutpostFlags {
    pub urgent: bool,
    pub request_delivery_receipt: bool,
    pub request_read_receipt: bool,
}

impl OutpostFlags {
    pub fn any(&self) -> bool {
        self.urgent || self.request_delivery_receipt || self.request_read_receipt
    }
}

/// Where and when a message was retrieved from a BBS.
///
/// Recorded as a `Received:` header when the message is saved locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retrieval {
    /// Call sign of the BBS, without the `.ampr.org` suffix.
    pub bbs: String,
    /// Bulletin area, for bulletins.
    pub area: Option<String>,
    pub date: DateTime<FixedOffset>,
}

/// Envelope information of a received message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Address replies should go to; empty if none could be determined.
    pub return_address: String,
    /// When the BBS received the message.
    pub delivery_time: Option<DateTime<FixedOffset>>,
    pub headers: Headers,
    /// The envelope line had an empty sender: a bounce or autoresponse.
    pub autoresponse: bool,
    /// First address of the `From:` header, with its display name.
    pub from: String,
    /// Bare addresses from the `To:`, `Cc:`, and `Bcc:` headers.
    pub to: Vec<String>,
    /// The `Subject:` header, exactly as received.
    pub subject_line: String,
    /// The `Date:` header.
    pub sent_date: Option<DateTime<FixedOffset>>,
    /// Our own `Received:` stamp, for messages read back from local storage.
    pub retrieval: Option<Retrieval>,
}

/// The plain-text body extracted from a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainBody {
    pub text: String,
    /// False when anything lossy happened on the way: a transfer encoding,
    /// a multipart structure, or a body that could not be used at all.
    pub fully_plain_text: bool,
}

/// What every successfully parsed message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedBase {
    #[serde(skip)]
    pub raw: String,
    pub envelope: Envelope,
    /// Plain-text body with Outpost flags removed.
    pub body: String,
    pub fully_plain_text: bool,
    pub flags: OutpostFlags,
}

/// A message whose headers could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unparseable {
    pub raw: String,
    pub error: String,
}

/// Why a message was set aside as a bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceReason {
    /// The envelope line named no sender.
    Autoresponse,
    /// No return address could be found anywhere.
    NoReturnAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bounce {
    #[serde(flatten)]
    pub base: ReceivedBase,
    pub reason: BounceReason,
}

/// A delivery receipt for a message we sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    #[serde(flatten)]
    pub base: ReceivedBase,
    /// Message ID the recipient assigned to our message.
    pub local_message_id: String,
    pub delivered_to: String,
    pub delivered_subject: String,
    pub delivered_time: Option<DateTime<FixedOffset>>,
}

/// A read receipt for a message we sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadReceipt {
    #[serde(flatten)]
    pub base: ReceivedBase,
    pub read_subject: String,
    pub read_time: Option<DateTime<FixedOffset>>,
}

/// A human-authored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlainMessage {
    #[serde(flatten)]
    pub base: ReceivedBase,
    pub from_call_sign: Option<String>,
    pub from_bbs: Option<String>,
    pub subject: SubjectParts,
}

/// A message carrying a PIFO form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormMessage {
    #[serde(flatten)]
    pub message: PlainMessage,
    pub form: TaggedForm,
}

/// The most specific interpretation of a received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedMessage {
    Unparseable(Unparseable),
    Bounce(Bounce),
    DeliveryReceipt(DeliveryReceipt),
    ReadReceipt(ReadReceipt),
    PlainMessage(PlainMessage),
    GenericForm(FormMessage),
    KnownForm {
        form_kind: FormKind,
        message: FormMessage,
    },
}

impl ClassifiedMessage {
    /// Short machine-readable name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Unparseable(_) => "unparseable",
            Self::Bounce(_) => "bounce",
            Self::DeliveryReceipt(_) => "delivery_receipt",
            Self::ReadReceipt(_) => "read_receipt",
            Self::PlainMessage(_) => "plain_message",
            Self::GenericForm(_) => "generic_form",
            Self::KnownForm { .. } => "known_form",
        }
    }

    /// The original message text.
    pub fn raw(&self) -> &str {
        match self {
            Self::Unparseable(u) => &u.raw,
            _ => self.base().map(|b| b.raw.as_str()).unwrap_or_default(),
        }
    }

    pub fn base(&self) -> Option<&ReceivedBase> {
        match self {
            Self::Unparseable(_) => None,
            Self::Bounce(b) => Some(&b.base),
            Self::DeliveryReceipt(r) => Some(&r.base),
            Self::ReadReceipt(r) => Some(&r.base),
            Self::PlainMessage(m) => Some(&m.base),
            Self::GenericForm(f) | Self::KnownForm { message: f, .. } => Some(&f.message.base),
        }
    }

    pub fn plain_message(&self) -> Option<&PlainMessage> {
        match self {
            Self::PlainMessage(m) => Some(m),
            Self::GenericForm(f) | Self::KnownForm { message: f, .. } => Some(&f.message),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&TaggedForm> {
        match self {
            Self::GenericForm(f) | Self::KnownForm { message: f, .. } => Some(&f.form),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ReceivedBase {
        ReceivedBase {
            raw: "Subject: hi\n\nbody\n".into(),
            envelope: Envelope::default(),
            body: "body\n".into(),
            fully_plain_text: true,
            flags: OutpostFlags::default(),
        }
    }

    #[test]
    fn test_flags_any() {
        assert!(!OutpostFlags::default().any());
        let flags = OutpostFlags {
            request_read_receipt: true,
            ..Default::default()
        };
        assert!(flags.any());
    }

    #[test]
    fn test_accessors() {
        let msg = ClassifiedMessage::PlainMessage(PlainMessage {
            base: base(),
            from_call_sign: None,
            from_bbs: None,
            subject: SubjectParts::bare("hi"),
        });
        assert_eq!(msg.kind_name(), "plain_message");
        assert_eq!(msg.raw(), "Subject: hi\n\nbody\n");
        assert!(msg.plain_message().is_some());
        assert!(msg.form().is_none());

        let bad = ClassifiedMessage::Unparseable(Unparseable {
            raw: "junk".into(),
            error: "nope".into(),
        });
        assert_eq!(bad.raw(), "junk");
        assert!(bad.base().is_none());
    }

    #[test]
    fn test_serialize_kind_tag() {
        let msg = ClassifiedMessage::Bounce(Bounce {
            base: base(),
            reason: BounceReason::NoReturnAddress,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "bounce");
        assert_eq!(json["reason"], "no_return_address");
        assert_eq!(json["body"], "body\n");
        assert!(json.get("raw").is_none());
    }
}
