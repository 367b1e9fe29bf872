//! Message Tests
//!
//! Tests for message kinds, argument grammar and request conversion.

use tablekv::protocol::{
    is_identifier, is_quoted_text, is_value, ArithOp, Command, Message, MessageKind,
    MAX_ENCODED_LEN,
};
use tablekv::TableKvError;

// =============================================================================
// MessageKind Tests
// =============================================================================

#[test]
fn test_kind_names_round_trip() {
    for kind in MessageKind::ALL {
        assert_eq!(MessageKind::from_name(kind.as_str()), Some(kind));
        assert_eq!(kind.to_string(), kind.as_str());
    }
}

#[test]
fn test_kind_names_are_case_sensitive() {
    assert_eq!(MessageKind::from_name("GET"), Some(MessageKind::Get));
    assert_eq!(MessageKind::from_name("get"), None);
    assert_eq!(MessageKind::from_name("Get"), None);
    assert_eq!(MessageKind::from_name(""), None);
}

#[test]
fn test_kind_request_response_split() {
    let responses: Vec<_> = MessageKind::ALL
        .iter()
        .copied()
        .filter(|k| k.is_response())
        .collect();

    assert_eq!(
        responses,
        vec![
            MessageKind::Ok,
            MessageKind::Failed,
            MessageKind::Error,
            MessageKind::Data
        ]
    );
    assert_eq!(MessageKind::ALL.iter().filter(|k| k.is_request()).count(), 14);
}

#[test]
fn test_kind_arity() {
    assert_eq!(MessageKind::Login.arity(), 1);
    assert_eq!(MessageKind::Create.arity(), 1);
    assert_eq!(MessageKind::Push.arity(), 1);
    assert_eq!(MessageKind::Set.arity(), 2);
    assert_eq!(MessageKind::Get.arity(), 2);
    assert_eq!(MessageKind::Data.arity(), 1);
    assert_eq!(MessageKind::Failed.arity(), 1);
    assert_eq!(MessageKind::Pop.arity(), 0);
    assert_eq!(MessageKind::Bye.arity(), 0);
    assert_eq!(MessageKind::Ok.arity(), 0);
}

// =============================================================================
// Grammar Tests
// =============================================================================

#[test]
fn test_identifier_grammar() {
    assert!(is_identifier("accounts"));
    assert!(is_identifier("line_items"));
    assert!(is_identifier("acct123"));
    assert!(is_identifier("a"));
    assert!(is_identifier("line items"));
    assert!(is_identifier("Ada Lovelace "));

    assert!(!is_identifier(""));
    assert!(!is_identifier("8foobar"));
    assert!(!is_identifier("_hidden"));
    assert!(!is_identifier("dash-ed"));
    assert!(!is_identifier("dotted.name"));
}

#[test]
fn test_value_grammar() {
    assert!(is_value("47374"));
    assert!(is_value("-1"));
    assert!(is_value("hello!"));

    assert!(!is_value(""));
    assert!(!is_value("two words"));
    assert!(!is_value("tab\there"));
    assert!(!is_value("\"opens with quote"));
    assert!(is_value("inner\"quote"));
}

#[test]
fn test_quoted_text_grammar() {
    assert!(is_quoted_text(""));
    assert!(is_quoted_text("Something went wrong, shucks!"));
    assert!(is_quoted_text("escaped \\\" quote"));

    assert!(!is_quoted_text("bare \" quote"));
    assert!(!is_quoted_text("trailing escape \\"));
}

// =============================================================================
// Message Tests
// =============================================================================

#[test]
fn test_message_validation() {
    assert!(Message::new(MessageKind::Login, ["alice"]).is_valid());
    assert!(Message::bare(MessageKind::Top).is_valid());
    assert!(Message::ok().is_valid());

    assert!(!Message::bare(MessageKind::Login).is_valid());
    assert!(!Message::new(MessageKind::Top, ["extra"]).is_valid());
    assert!(!Message::new(MessageKind::Create, ["9lives"]).is_valid());
    assert!(!Message::new(MessageKind::Push, ["has space"]).is_valid());
}

#[test]
fn test_message_too_long_is_invalid() {
    let ok = Message::new(MessageKind::Get, ["y".repeat(509), "y".repeat(509)]);
    assert_eq!(ok.encoded_len(), 1024);
    assert!(ok.is_valid());

    let long = Message::new(MessageKind::Set, ["x".repeat(509), "x".repeat(510)]);
    assert_eq!(long.encoded_len(), 1025);
    assert!(!long.is_valid());
}

#[test]
fn test_encoded_len_counts_quotes() {
    let failed = Message::failed("oops");
    // FAILED + space + "oops" + newline
    assert_eq!(failed.encoded_len(), 6 + 1 + 6 + 1);
}

#[test]
fn test_encoded_len_counts_quoted_identifiers() {
    let set = Message::new(MessageKind::Set, ["line items", "k"]);
    // SET + space + "line items" + space + k + newline
    assert_eq!(set.encoded_len(), 3 + 1 + 12 + 1 + 1 + 1);
}

#[test]
fn test_long_reply_text_is_truncated() {
    let failed = Message::failed(&format!("unable to lock table t{}", "a".repeat(999)));
    assert!(failed.is_valid());
    assert_eq!(failed.encoded_len(), MAX_ENCODED_LEN);
    assert!(failed.quoted_text().unwrap().starts_with("unable to lock table taaa"));

    let error = Message::error(&"e".repeat(5000));
    assert!(error.is_valid());
    assert_eq!(error.encoded_len(), MAX_ENCODED_LEN);
}

#[test]
fn test_truncation_respects_char_boundaries() {
    // 2 bytes per char, 1014 byte budget
    let failed = Message::failed(&"é".repeat(600));
    assert_eq!(failed.quoted_text().unwrap().chars().count(), 507);
    assert!(failed.is_valid());

    // 3 bytes per char: 338 chars use 1014 bytes exactly
    let error = Message::error(&"€".repeat(600));
    assert!(error.encoded_len() <= MAX_ENCODED_LEN);
    assert!(error.is_valid());
}

#[test]
fn test_truncation_drops_dangling_escape() {
    let text = format!("{}{}", "x".repeat(1013), "\\".repeat(10));
    let failed = Message::failed(&text);

    assert_eq!(failed.quoted_text(), Some("x".repeat(1013).as_str()));
    assert!(failed.is_valid());
}

#[test]
fn test_failed_text_is_sanitized() {
    let failed = Message::failed("bad \"thing\"\nhappened\\");
    assert_eq!(failed.quoted_text(), Some("bad 'thing' happened"));
    assert!(failed.is_valid());
}

#[test]
fn test_positional_accessors() {
    let set = Message::new(MessageKind::Set, ["accounts", "acct123"]);
    assert_eq!(set.table(), Some("accounts"));
    assert_eq!(set.key(), Some("acct123"));
    assert_eq!(set.arg(2), None);

    let pop = Message::bare(MessageKind::Pop);
    assert_eq!(pop.value(), None);
}

// =============================================================================
// Command Conversion Tests
// =============================================================================

#[test]
fn test_command_from_message() {
    let cases = vec![
        (
            Message::new(MessageKind::Login, ["alice"]),
            Command::Login {
                username: "alice".to_string(),
            },
        ),
        (
            Message::new(MessageKind::Push, ["5"]),
            Command::Push {
                value: "5".to_string(),
            },
        ),
        (
            Message::new(MessageKind::Get, ["accounts", "acct123"]),
            Command::Get {
                table: "accounts".to_string(),
                key: "acct123".to_string(),
            },
        ),
        (Message::bare(MessageKind::Sub), Command::Arith(ArithOp::Sub)),
        (Message::bare(MessageKind::Commit), Command::Commit),
    ];

    for (message, expected) in cases {
        let kind = message.kind();
        let command = Command::try_from(message).unwrap();
        assert_eq!(command.kind(), kind);
        assert_eq!(command, expected);
    }
}

#[test]
fn test_command_round_trips_to_message() {
    let command = Command::Set {
        table: "invoices".to_string(),
        key: "inv42".to_string(),
    };
    let message = Message::from(command.clone());

    assert_eq!(message, Message::new(MessageKind::Set, ["invoices", "inv42"]));
    assert_eq!(Command::try_from(message).unwrap(), command);
}

#[test]
fn test_response_is_not_a_command() {
    for message in [Message::ok(), Message::data("1"), Message::failed("x")] {
        let result = Command::try_from(message);
        assert!(matches!(result, Err(TableKvError::InvalidMessage(_))));
    }
}

#[test]
fn test_malformed_message_is_not_a_command() {
    let result = Command::try_from(Message::new(MessageKind::Set, ["accounts"]));
    assert!(matches!(result, Err(TableKvError::InvalidMessage(_))));
}

// =============================================================================
// Arithmetic Tests
// =============================================================================

#[test]
fn test_arith_apply() {
    assert_eq!(ArithOp::Add.apply(2, 3).unwrap(), 5);
    assert_eq!(ArithOp::Sub.apply(5, 3).unwrap(), 2);
    assert_eq!(ArithOp::Mul.apply(6, 7).unwrap(), 42);
    assert_eq!(ArithOp::Div.apply(7, 2).unwrap(), 3);
}

#[test]
fn test_arith_errors_are_recoverable() {
    let cases = [
        ArithOp::Div.apply(7, 0),
        ArithOp::Sub.apply(3, 5),
        ArithOp::Add.apply(u64::MAX, 1),
        ArithOp::Mul.apply(u64::MAX, 2),
    ];

    for result in cases {
        let err = result.unwrap_err();
        assert!(err.is_recoverable(), "{:?}", err);
    }
}

#[test]
fn test_arith_kind() {
    assert_eq!(ArithOp::Add.kind(), MessageKind::Add);
    assert_eq!(ArithOp::Div.kind(), MessageKind::Div);
}
