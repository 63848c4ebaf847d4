//! Message classifier: the entry point that turns raw message text into its
//! most specific interpretation.
//!
//! Stages are tried in a fixed order and the first match wins. Every stage
//! looks at the same parsed envelope and body, so a stage that declines
//! leaves nothing behind for the next.

use tracing::{debug, warn};

use crate::codec::{outpost, pifo, subject};
use crate::model::address::{from_bbs, from_call_sign};
use crate::model::message::{
    Bounce, BounceReason, ClassifiedMessage, DeliveryReceipt, FormMessage, PlainBody,
    PlainMessage, ReadReceipt, ReceivedBase, Unparseable,
};
use crate::parser::envelope::read_envelope;
use crate::parser::header::{is_receipt_time, parse_receipt_time};
use crate::parser::mime::extract_plain_text;

const DELIVERED_PREFIX: &str = "DELIVERED: ";
const READ_PREFIX: &str = "READ: ";

/// Classify one raw message.
///
/// Never fails: a message whose headers cannot be read comes back as
/// [`ClassifiedMessage::Unparseable`] with the raw text attached.
pub fn classify(raw: &str) -> ClassifiedMessage {
    let base = match parse_base(raw) {
        Ok(base) => base,
        Err(e) => {
            debug!(error = %e, "Message is unparseable");
            return ClassifiedMessage::Unparseable(Unparseable {
                raw: raw.to_string(),
                error: e.to_string(),
            });
        }
    };

    if base.envelope.autoresponse {
        debug!("Classified as autoresponse bounce");
        return ClassifiedMessage::Bounce(Bounce {
            base,
            reason: BounceReason::Autoresponse,
        });
    }

    let base = match delivery_receipt(base) {
        Ok(receipt) => {
            debug!(id = %receipt.local_message_id, "Classified as delivery receipt");
            return ClassifiedMessage::DeliveryReceipt(receipt);
        }
        Err(base) => base,
    };

    let base = match read_receipt(base) {
        Ok(receipt) => {
            debug!("Classified as read receipt");
            return ClassifiedMessage::ReadReceipt(receipt);
        }
        Err(base) => base,
    };

    if base.envelope.return_address.is_empty() {
        debug!("No return address; not a human-content message");
        return ClassifiedMessage::Bounce(Bounce {
            base,
            reason: BounceReason::NoReturnAddress,
        });
    }

    let message = plain_message(base);

    if !pifo::has_header(&message.base.body) {
        debug!("Classified as plain message");
        return ClassifiedMessage::PlainMessage(message);
    }
    match pifo::decode(&message.base.body) {
        Ok(form) => match form.kind() {
            Some(form_kind) => {
                debug!(kind = ?form_kind, "Classified as known form");
                ClassifiedMessage::KnownForm {
                    form_kind,
                    message: FormMessage { message, form },
                }
            }
            None => {
                debug!(html = %form.html_ident, "Classified as generic form");
                ClassifiedMessage::GenericForm(FormMessage { message, form })
            }
        },
        Err(e) => {
            debug!(error = %e, "PIFO decode failed; treating as plain message");
            ClassifiedMessage::PlainMessage(message)
        }
    }
}

/// Envelope, plain-text body, and Outpost flags of a message.
fn parse_base(raw: &str) -> crate::error::Result<ReceivedBase> {
    let (envelope, body) = read_envelope(raw)?;
    let plain = extract_plain_text(&envelope.headers, body).unwrap_or_else(|e| {
        warn!(error = %e, "Undecodable message body");
        PlainBody {
            text: String::new(),
            fully_plain_text: false,
        }
    });
    let unwrapped = outpost::decode(&plain.text);
    Ok(ReceivedBase {
        raw: raw.to_string(),
        envelope,
        body: unwrapped.text,
        fully_plain_text: plain.fully_plain_text && !unwrapped.was_base64,
        flags: unwrapped.flags,
    })
}

/// Interpret `base` as a delivery receipt, or hand it back.
fn delivery_receipt(base: ReceivedBase) -> std::result::Result<DeliveryReceipt, ReceivedBase> {
    let Some((id, subject, stamp)) = match_delivery_receipt(&base) else {
        return Err(base);
    };
    let local_message_id = id.to_string();
    let delivered_subject = subject.to_string();
    let delivered_time = parse_receipt_time(stamp);
    let delivered_to = base
        .body
        .lines()
        .find_map(|line| line.strip_prefix("To: "))
        .unwrap_or_default()
        .to_string();
    Ok(DeliveryReceipt {
        base,
        local_message_id,
        delivered_to,
        delivered_subject,
        delivered_time,
    })
}

/// Local message ID, delivered subject, and timestamp of a delivery receipt.
fn match_delivery_receipt(base: &ReceivedBase) -> Option<(&str, &str, &str)> {
    if !base.fully_plain_text {
        return None;
    }
    let subject = base.envelope.subject_line.strip_prefix(DELIVERED_PREFIX)?;
    let (id, rest) = base.body.strip_prefix("!LMI!")?.split_once('!')?;
    if id.is_empty() {
        return None;
    }
    let stamp = receipt_stamp(rest.strip_prefix("DR!")?)?;
    Some((id, subject, stamp))
}

fn read_receipt(base: ReceivedBase) -> std::result::Result<ReadReceipt, ReceivedBase> {
    let Some((subject, stamp)) = match_read_receipt(&base) else {
        return Err(base);
    };
    let read_subject = subject.to_string();
    let read_time = parse_receipt_time(stamp);
    Ok(ReadReceipt {
        base,
        read_subject,
        read_time,
    })
}

fn match_read_receipt(base: &ReceivedBase) -> Option<(&str, &str)> {
    if !base.fully_plain_text {
        return None;
    }
    let subject = base.envelope.subject_line.strip_prefix(READ_PREFIX)?;
    let stamp = receipt_stamp(base.body.strip_prefix("!RR!")?)?;
    Some((subject, stamp))
}

/// The receipt timestamp at the start of `text`, which must end the line.
fn receipt_stamp(text: &str) -> Option<&str> {
    let (stamp, _) = text.split_once('\n')?;
    is_receipt_time(stamp).then_some(stamp)
}

fn plain_message(base: ReceivedBase) -> PlainMessage {
    let address = &base.envelope.return_address;
    PlainMessage {
        from_call_sign: from_call_sign(address),
        from_bbs: from_bbs(address),
        subject: subject::decode(&base.envelope.subject_line),
        base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::form::FormKind;

    #[test]
    fn test_unparseable() {
        let msg = classify("garbage without headers\n");
        match msg {
            ClassifiedMessage::Unparseable(u) => {
                assert_eq!(u.raw, "garbage without headers\n");
                assert!(u.error.contains("malformed"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_autoresponse_wins_over_everything() {
        let raw = "From  Mon Jan  2 15:04:05 2006\n\
                   From: kc6rsc@w1xsc.ampr.org\n\
                   Subject: DELIVERED: x\n\n\
                   !LMI!X!DR!2021-01-01 00:00:00\n";
        match classify(raw) {
            ClassifiedMessage::Bounce(b) => assert_eq!(b.reason, BounceReason::Autoresponse),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delivery_receipt() {
        let raw = "From: aa6bt@w2xsc.ampr.org\n\
                   Subject: DELIVERED: XSC-1P_R_Hello\n\n\
                   !LMI!W2X-7!DR!2021-01-01 12:34:56\n\
                   Your Message\n\
                   To: kc6rsc@w1xsc.ampr.org\n\
                   Subject: XSC-1P_R_Hello\n\
                   was delivered on 2021-01-01 12:34:56\n\
                   Recipient's Local Message ID: W2X-7\n";
        match classify(raw) {
            ClassifiedMessage::DeliveryReceipt(r) => {
                assert_eq!(r.local_message_id, "W2X-7");
                assert_eq!(r.delivered_subject, "XSC-1P_R_Hello");
                assert_eq!(r.delivered_to, "kc6rsc@w1xsc.ampr.org");
                assert_eq!(
                    r.delivered_time.map(|t| t.format("%F %T").to_string()).as_deref(),
                    Some("2021-01-01 12:34:56")
                );
                assert_eq!(r.base.envelope.return_address, "aa6bt@w2xsc.ampr.org");
                assert!(r.base.raw.starts_with("From: "));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_receipt_body_without_subject_is_plain() {
        let raw = "From: aa6bt@w2xsc.ampr.org\n\
                   Subject: Hello\n\n\
                   !LMI!X!DR!2021-01-01 00:00:00\nmore\n";
        assert_eq!(classify(raw).kind_name(), "plain_message");
    }

    #[test]
    fn test_receipt_needs_plain_text() {
        let raw = "From: aa6bt@w2xsc.ampr.org\n\
                   Subject: READ: Hello\n\
                   Content-Transfer-Encoding: base64\n\n\
                   IVJSITIwMjEtMDEtMDEgMDA6MDA6MDAK\n";
        assert_eq!(classify(raw).kind_name(), "plain_message");
    }

    #[test]
    fn test_read_receipt() {
        let raw = "From: aa6bt@w2xsc.ampr.org\n\
                   Subject: READ: Hello\n\n\
                   !RR!2021-02-03 04:05:06\nYour Message\n";
        match classify(raw) {
            ClassifiedMessage::ReadReceipt(r) => {
                assert_eq!(r.read_subject, "Hello");
                assert!(r.read_time.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_no_return_address() {
        let raw = "Subject: AAA-111P_R_Hello\n\nbody\n";
        match classify(raw) {
            ClassifiedMessage::Bounce(b) => {
                assert_eq!(b.reason, BounceReason::NoReturnAddress);
                assert_eq!(b.base.body, "body\n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plain_message() {
        let raw = "From: Jim <kc6rsc@w1xsc.ampr.org>\n\
                   Subject: AAA-111P_O/R_Hello, World\n\n\
                   !URG!Body text\n";
        match classify(raw) {
            ClassifiedMessage::PlainMessage(m) => {
                assert_eq!(m.from_call_sign.as_deref(), Some("KC6RSC"));
                assert_eq!(m.from_bbs.as_deref(), Some("W1XSC"));
                assert_eq!(m.subject.origin_msg_id, "AAA-111P");
                assert_eq!(m.subject.severity_code, Some('O'));
                assert_eq!(m.subject.handling_code, Some('R'));
                assert_eq!(m.subject.subject, "Hello, World");
                assert!(m.base.flags.urgent);
                assert_eq!(m.base.body, "Body text\n");
                assert!(m.base.fully_plain_text);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_commented_return_address_yields_bbs() {
        let raw = "From: kc6rsc@w1xsc.ampr.org (Jim Smith)\nSubject: XSC-1P_R_Hi\n\nhello\n";
        match classify(raw) {
            ClassifiedMessage::PlainMessage(m) => {
                assert_eq!(m.base.envelope.return_address, "kc6rsc@w1xsc.ampr.org");
                assert_eq!(m.from_call_sign.as_deref(), Some("KC6RSC"));
                assert_eq!(m.from_bbs.as_deref(), Some("W1XSC"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_known_form() {
        let raw = "From: kc6rsc@w1xsc.ampr.org\n\
                   Subject: XSC-1P_R_ICS213_Hello\n\n\
                   !SCCoPIFO!\n#T: form-ics213.html\n#V: 3.9-2.2\nMsgNo: [XSC-1P]\n!/ADDON!\n";
        match classify(raw) {
            ClassifiedMessage::KnownForm { form_kind, message } => {
                assert_eq!(form_kind, FormKind::Ics213);
                assert_eq!(message.form.fields.get("MsgNo"), Some("XSC-1P"));
                assert_eq!(message.message.subject.form_tag.as_deref(), Some("ICS213"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_broken_form_falls_back_to_plain() {
        let raw = "From: kc6rsc@w1xsc.ampr.org\n\
                   Subject: Hello\n\n\
                   !SCCoPIFO!\n#T: tt.html\n#V: 1-2\nA: [x]\nA: [x]\n!/ADDON!\n";
        assert_eq!(classify(raw).kind_name(), "plain_message");
    }

    #[test]
    fn test_undecodable_body_still_classifies() {
        let raw = "From: kc6rsc@w1xsc.ampr.org\n\
                   Subject: Hello\n\
                   Content-Type: text/plain; charset\n\n\
                   body\n";
        match classify(raw) {
            ClassifiedMessage::PlainMessage(m) => {
                assert_eq!(m.base.body, "");
                assert!(!m.base.fully_plain_text);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
