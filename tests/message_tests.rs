//! Integration tests for message classification and the encode pipeline.

use std::path::Path;

use chrono::{FixedOffset, TimeZone};
use predicates::prelude::*;

use pktmsg::classify;
use pktmsg::codec::{outpost, pifo, subject};
use pktmsg::export::message::{OutgoingContent, OutgoingMessage};
use pktmsg::model::form::{FormKind, TaggedForm};
use pktmsg::model::message::{BounceReason, ClassifiedMessage, OutpostFlags, Retrieval};
use pktmsg::parser::header::decode_raw_bytes;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    decode_raw_bytes(&std::fs::read(path).unwrap())
}

// ─── Known form from a BBS ──────────────────────────────────────────

#[test]
fn test_ics213_fixture() {
    let msg = classify(&fixture("ics213.eml"));
    let ClassifiedMessage::KnownForm { form_kind, message } = &msg else {
        panic!("expected a known form, got {}", msg.kind_name());
    };
    assert_eq!(*form_kind, FormKind::Ics213);

    let plain = &message.message;
    assert_eq!(plain.from_call_sign.as_deref(), Some("KC6RSC"));
    assert_eq!(plain.from_bbs.as_deref(), Some("W1XSC"));
    assert_eq!(plain.subject.origin_msg_id, "XSC-101P");
    assert_eq!(plain.subject.form_tag.as_deref(), Some("ICS213"));
    assert_eq!(plain.subject.subject, "Water main break");
    assert!(plain.base.flags.request_delivery_receipt);
    assert!(plain.base.fully_plain_text);
    assert_eq!(
        plain.base.envelope.to,
        vec!["aa6bt@w2xsc.ampr.org", "k6ksc@w3xsc.ampr.org"]
    );

    let form = &message.form;
    assert_eq!(form.pifo_version, "3.9");
    assert_eq!(form.form_version, "2.2");
    assert_eq!(form.fields.len(), 4);
    assert_eq!(form.fields.get("5."), Some("ROUTINE"));
    assert_eq!(
        form.fields.get("12."),
        Some("Break at 1st and Main.\nCrews en route. Use ] for brackets.")
    );
    assert_eq!(form.text_after, "");
}

// ─── MIME ───────────────────────────────────────────────────────────

#[test]
fn test_multipart_fixture() {
    let msg = classify(&fixture("multipart.eml"));
    let plain = msg.plain_message().expect("plain message");
    assert_eq!(plain.base.body, "Café is open today.");
    assert!(!plain.base.fully_plain_text);
    assert_eq!(plain.subject.subject, "Status update");
    assert!(plain.subject.origin_msg_id.is_empty());
}

// ─── Receipts ───────────────────────────────────────────────────────

#[test]
fn test_delivery_receipt_fixture() {
    match classify(&fixture("delivery_receipt.eml")) {
        ClassifiedMessage::DeliveryReceipt(r) => {
            assert_eq!(r.local_message_id, "W2X-17");
            assert_eq!(r.delivered_to, "kc6rsc@w1xsc.ampr.org");
            assert_eq!(
                r.delivered_subject,
                "XSC-101P_O/R_ICS213_Water main break"
            );
            assert!(r.delivered_time.is_some());
        }
        other => panic!("expected a delivery receipt, got {}", other.kind_name()),
    }
}

#[test]
fn test_receipt_body_without_receipt_subject() {
    let raw = "From: aa6bt@w2xsc.ampr.org\n\
               Subject: Fwd: status\n\n\
               !LMI!X!DR!2021-01-01 00:00:00\n...\n";
    assert_eq!(classify(raw).kind_name(), "plain_message");
}

#[test]
fn test_delivery_receipt_round_trip() {
    let when = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2021, 6, 7, 8, 9, 10)
        .unwrap();
    let mut msg = OutgoingMessage::new(OutgoingContent::DeliveryReceipt {
        local_message_id: "W2X-17".into(),
        delivered_to: "kc6rsc@w1xsc.ampr.org".into(),
        delivered_subject: "XSC-101P_R_Hello".into(),
        delivered_time: Some(when),
    });
    msg.from = "aa6bt@w2xsc.ampr.org".into();
    msg.to = vec!["kc6rsc@w1xsc.ampr.org".into()];

    let tx = msg.transmit().unwrap();
    assert_eq!(tx.subject, "DELIVERED: XSC-101P_R_Hello");
    assert!(predicate::str::starts_with("!LMI!W2X-17!DR!2021-06-07 08:09:10\n").eval(&tx.body));

    match classify(&msg.render_saved(None).unwrap()) {
        ClassifiedMessage::DeliveryReceipt(r) => {
            assert_eq!(r.local_message_id, "W2X-17");
            assert_eq!(r.delivered_subject, "XSC-101P_R_Hello");
        }
        other => panic!("expected a delivery receipt, got {}", other.kind_name()),
    }
}

// ─── Bounces ────────────────────────────────────────────────────────

#[test]
fn test_autoresponse_bounce() {
    let raw = "From  Fri Jan  1 12:35:00 2021\n\
               From: MAILER-DAEMON@w2xsc.ampr.org\n\
               Subject: Returned mail\n\n\
               User unknown\n";
    match classify(raw) {
        ClassifiedMessage::Bounce(b) => {
            assert_eq!(b.reason, BounceReason::Autoresponse);
            assert_eq!(b.base.body, "User unknown\n");
        }
        other => panic!("expected a bounce, got {}", other.kind_name()),
    }
}

#[test]
fn test_unparseable_keeps_raw_text() {
    let raw = "this is\nnot a message\n";
    let msg = classify(raw);
    assert_eq!(msg.kind_name(), "unparseable");
    assert_eq!(msg.raw(), raw);
}

// ─── Forms ──────────────────────────────────────────────────────────

#[test]
fn test_generic_form_end_to_end() {
    let raw = "From: <nobody@nowhere>\n\n!SCCoPIFO!\n#T: tt.html\n#V: 1-2\nA: [x]\n!/ADDON!\n";
    match classify(raw) {
        ClassifiedMessage::GenericForm(f) => {
            assert_eq!(f.form.html_ident, "tt.html");
            assert_eq!(f.form.pifo_version, "1");
            assert_eq!(f.form.form_version, "2");
            assert_eq!(f.form.fields.iter().collect::<Vec<_>>(), vec![("A", "x")]);
        }
        other => panic!("expected a generic form, got {}", other.kind_name()),
    }
}

#[test]
fn test_duplicate_tag_is_not_a_form() {
    for second in ["x", "y"] {
        let raw = format!(
            "From: <nobody@nowhere>\n\n!SCCoPIFO!\n#T: tt.html\n#V: 1-2\nA: [x]\nA: [{second}]\n!/ADDON!\n"
        );
        assert_eq!(classify(&raw).kind_name(), "plain_message");
    }
}

#[test]
fn test_form_round_trip_with_awkward_values() {
    let values = [
        "plain text",
        "embedded ] bracket",
        "back\\slash",
        "two\nlines",
        "ends in `",
        "`]]] looks like a closer",
    ];
    let mut form = TaggedForm::new("form-oa-shelter-status.html", "3.9", "2.1");
    for (i, value) in values.iter().enumerate() {
        form.fields.set(format!("{}.", i + 1), *value);
    }
    form.fields.set("long", "0123456789 ".repeat(30));

    let decoded = pifo::decode(&pifo::encode(&form)).unwrap();
    assert_eq!(decoded.fields, form.fields);
    assert_eq!(decoded.kind(), Some(FormKind::SheltStat));
}

#[test]
fn test_outgoing_form_classifies_back() {
    let mut form = TaggedForm::new(FormKind::Ics213.html_ident(), "3.9", "2.2");
    form.fields.set("MsgNo", "XSC-102P");
    form.fields.set("10.", "Shelter opening");
    let mut msg = OutgoingMessage::new(OutgoingContent::Form {
        subject: subject::decode("XSC-102P_I_Shelter opening"),
        form,
    });
    msg.from = "kc6rsc@w1xsc.ampr.org".into();
    msg.to = vec!["aa6bt@w2xsc.ampr.org".into()];

    let tx = msg.transmit().unwrap();
    assert_eq!(tx.subject, "XSC-102P_I_ICS213_Shelter opening");
    assert!(predicate::str::starts_with("!URG!!SCCoPIFO!\n").eval(&tx.body));

    let saved = msg.render_saved(None).unwrap();
    let ClassifiedMessage::KnownForm { form_kind, message } = classify(&saved) else {
        panic!("expected a known form");
    };
    assert_eq!(form_kind, FormKind::Ics213);
    assert!(message.message.base.flags.urgent);
    assert_eq!(message.form.fields.get("10."), Some("Shelter opening"));
}

// ─── Outpost escapes and saved framing ──────────────────────────────

#[test]
fn test_base64_body_survives_classification() {
    let flags = OutpostFlags {
        request_read_receipt: true,
        ..Default::default()
    };
    let body = outpost::encode(flags, "Température: 30°C\n");
    let raw = format!("From: kc6rsc@w1xsc.ampr.org\nSubject: Weather\n\n{body}");
    let msg = classify(&raw);
    let base = msg.base().unwrap();
    assert_eq!(base.body, "Température: 30°C\n");
    assert!(base.flags.request_read_receipt);
    assert!(!base.fully_plain_text);
}

#[test]
fn test_saved_bulletin_keeps_area() {
    let retrieval = Retrieval {
        bbs: "W4XSC".into(),
        area: Some("XSCEVENT".into()),
        date: FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2022, 3, 2, 10, 0, 0)
            .unwrap(),
    };
    let saved = classify(&fixture("ics213.eml")).render_saved(Some(&retrieval));
    assert!(predicate::str::starts_with(
        "Received: FROM W4XSC.ampr.org BY pktmsg.local FOR XSCEVENT;\n\t"
    )
    .eval(&saved));
    assert!(predicate::str::contains("\n\n!RDR!!SCCoPIFO!\n").eval(&saved));

    let reloaded = classify(&saved);
    assert_eq!(reloaded.kind_name(), "known_form");
    assert_eq!(
        reloaded.base().unwrap().envelope.retrieval.as_ref(),
        Some(&retrieval)
    );
}
