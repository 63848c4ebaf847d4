//! Outgoing messages: composing, transmitting, and saving to local storage.
//!
//! Saved messages use the same RFC 5322 layout the envelope reader accepts,
//! with our own `Received:` stamp recording where the message came from.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::codec::subject::{HandlingOrder, SubjectParts};
use crate::codec::{outpost, pifo, subject};
use crate::error::{PktMsgError, Result};
use crate::model::form::TaggedForm;
use crate::model::message::{ClassifiedMessage, OutpostFlags, Retrieval};
use crate::parser::envelope::{render_received_stamp, RFC1123Z};
use crate::parser::header::RECEIPT_TIME_FORMAT;

/// What an outgoing message says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingContent {
    Plain {
        subject: SubjectParts,
        body: String,
    },
    Form {
        subject: SubjectParts,
        form: TaggedForm,
    },
    DeliveryReceipt {
        local_message_id: String,
        delivered_to: String,
        delivered_subject: String,
        delivered_time: Option<DateTime<FixedOffset>>,
    },
    ReadReceipt {
        read_to: String,
        read_subject: String,
        read_time: Option<DateTime<FixedOffset>>,
    },
}

/// A message being composed or already sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub flags: OutpostFlags,
    pub content: OutgoingContent,
    pub sent_date: Option<DateTime<FixedOffset>>,
    /// Subject line as transmitted. Once set, it is used verbatim and
    /// edits to the subject parts no longer change it.
    pub finalized_subject: Option<String>,
}

/// Everything the transport needs to send one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(content: OutgoingContent) -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            flags: OutpostFlags::default(),
            content,
            sent_date: None,
            finalized_subject: None,
        }
    }

    /// The subject line, encoded from its parts unless already finalized.
    pub fn subject_line(&self) -> String {
        if let Some(line) = &self.finalized_subject {
            return line.clone();
        }
        match &self.content {
            OutgoingContent::Plain { subject, .. } => subject::encode(subject),
            OutgoingContent::Form { subject, form } => {
                if subject.form_tag.is_none() {
                    if let Some(kind) = form.kind() {
                        return subject::encode(&SubjectParts {
                            form_tag: Some(kind.tag().to_string()),
                            ..subject.clone()
                        });
                    }
                }
                subject::encode(subject)
            }
            OutgoingContent::DeliveryReceipt {
                delivered_subject, ..
            } => format!("DELIVERED: {delivered_subject}"),
            OutgoingContent::ReadReceipt { read_subject, .. } => format!("READ: {read_subject}"),
        }
    }

    /// The message body before Outpost flags are applied.
    ///
    /// Receipts need all of their fields; a missing one is an
    /// [`Incomplete`](PktMsgError::Incomplete) error.
    pub fn body(&self) -> Result<String> {
        match &self.content {
            OutgoingContent::Plain { body, .. } => Ok(body.clone()),
            OutgoingContent::Form { form, .. } => Ok(pifo::encode(form)),
            OutgoingContent::DeliveryReceipt {
                local_message_id,
                delivered_to,
                delivered_subject,
                delivered_time,
            } => {
                require(local_message_id, "local_message_id")?;
                require(delivered_to, "delivered_to")?;
                require(delivered_subject, "delivered_subject")?;
                let time = delivered_time
                    .ok_or(PktMsgError::Incomplete("delivered_time"))?
                    .format(RECEIPT_TIME_FORMAT);
                Ok(format!(
                    "!LMI!{local_message_id}!DR!{time}\n\
                     Your Message\n\
                     To: {delivered_to}\n\
                     Subject: {delivered_subject}\n\
                     was delivered on {time}\n\
                     Recipient's Local Message ID: {local_message_id}\n"
                ))
            }
            OutgoingContent::ReadReceipt {
                read_to,
                read_subject,
                read_time,
            } => {
                require(read_to, "read_to")?;
                require(read_subject, "read_subject")?;
                let time = read_time
                    .ok_or(PktMsgError::Incomplete("read_time"))?
                    .format(RECEIPT_TIME_FORMAT);
                Ok(format!(
                    "!RR!{time}\n\
                     Your Message\n\
                     \n\
                     To: {read_to}\n\
                     Subject: {read_subject}\n\
                     \n\
                     was read on {time}\n"
                ))
            }
        }
    }

    /// Flags to send with, including the urgent flag implied by an
    /// `IMMEDIATE` handling order.
    pub fn effective_flags(&self) -> OutpostFlags {
        let mut flags = self.flags;
        let handling = match &self.content {
            OutgoingContent::Plain { subject, .. } | OutgoingContent::Form { subject, .. } => {
                subject.handling()
            }
            _ => None,
        };
        if handling == Some(HandlingOrder::Immediate) {
            flags.urgent = true;
        }
        flags
    }

    /// Build the transmission for this message.
    pub fn transmit(&self) -> Result<Transmission> {
        if self.to.is_empty() {
            return Err(PktMsgError::Incomplete("to"));
        }
        Ok(Transmission {
            recipients: self.to.clone(),
            subject: self.subject_line(),
            body: render_body(self.effective_flags(), &self.body()?),
        })
    }

    /// Freeze the subject line and record the send time.
    pub fn mark_transmitted(&mut self, now: DateTime<FixedOffset>) {
        self.finalized_subject = Some(self.subject_line());
        self.sent_date = Some(now);
    }

    /// Render the message for local storage.
    pub fn render_saved(&self, retrieval: Option<&Retrieval>) -> Result<String> {
        let body = render_body(self.effective_flags(), &self.body()?);
        Ok(render_saved(
            retrieval,
            &self.from,
            &self.to,
            &self.subject_line(),
            self.sent_date.as_ref(),
            &body,
        ))
    }
}

impl ClassifiedMessage {
    /// Render a received message for local storage.
    ///
    /// The stamp defaults to the one the message was read back with, if
    /// any. An unparseable message is stored exactly as received.
    pub fn render_saved(&self, retrieval: Option<&Retrieval>) -> String {
        let Some(base) = self.base() else {
            return self.raw().to_string();
        };
        let env = &base.envelope;
        render_saved(
            retrieval.or(env.retrieval.as_ref()),
            &env.from,
            &env.to,
            &env.subject_line,
            env.sent_date.as_ref(),
            &render_body(base.flags, &base.body),
        )
    }
}

fn require(value: &str, field: &'static str) -> Result<()> {
    if value.is_empty() {
        Err(PktMsgError::Incomplete(field))
    } else {
        Ok(())
    }
}

/// Apply Outpost flags to a body, making sure a non-empty one ends in a
/// newline.
fn render_body(flags: OutpostFlags, body: &str) -> String {
    if body.is_empty() || body.ends_with('\n') {
        outpost::encode(flags, body)
    } else {
        outpost::encode(flags, &format!("{body}\n"))
    }
}

fn render_saved(
    retrieval: Option<&Retrieval>,
    from: &str,
    to: &[String],
    subject: &str,
    date: Option<&DateTime<FixedOffset>>,
    body: &str,
) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    if let Some(retrieval) = retrieval {
        out.push_str(&render_received_stamp(retrieval));
    }
    if !from.is_empty() {
        out.push_str(&format!("From: {from}\n"));
    }
    if !to.is_empty() {
        out.push_str(&format!("To: {}\n", to.join(",\n\t")));
    }
    if !subject.is_empty() {
        out.push_str(&format!("Subject: {subject}\n"));
    }
    if let Some(date) = date {
        out.push_str(&format!("Date: {}\n", date.format(RFC1123Z)));
    }
    out.push('\n');
    out.push_str(body);
    out
}
