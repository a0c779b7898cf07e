//! Tests for autoplay-core: action tokens, input phases, frames, errors

use autoplay_core::*;
use std::collections::HashSet;

// ===========================================================================
// ActionToken
// ===========================================================================

#[test]
fn action_token_parses_every_member() {
    for token in ActionToken::ALL {
        let parsed: ActionToken = token.as_str().parse().unwrap();
        assert_eq!(parsed, token);
    }
}

#[test]
fn action_token_parse_is_case_insensitive_and_trims() {
    assert_eq!(" up ".parse::<ActionToken>().unwrap(), ActionToken::Up);
    assert_eq!("Select".parse::<ActionToken>().unwrap(), ActionToken::Select);
    assert_eq!("a".parse::<ActionToken>().unwrap(), ActionToken::A);
}

#[test]
fn action_token_rejects_unknown() {
    let err = "ZZZ".parse::<ActionToken>().unwrap_err();
    assert!(matches!(err, Error::UnknownAction(ref s) if s == "ZZZ"));
    assert!("".parse::<ActionToken>().is_err());
    assert!("UP UP".parse::<ActionToken>().is_err());
}

#[test]
fn action_token_index_matches_all_order() {
    for (i, token) in ActionToken::ALL.iter().enumerate() {
        assert_eq!(token.index(), i);
    }
    let unique: HashSet<_> = ActionToken::ALL.iter().collect();
    assert_eq!(unique.len(), 8);
}

#[test]
fn action_token_serializes_uppercase() {
    assert_eq!(serde_json::to_string(&ActionToken::Start).unwrap(), r#""START""#);
    let back: ActionToken = serde_json::from_str(r#""LEFT""#).unwrap();
    assert_eq!(back, ActionToken::Left);
}

#[test]
fn action_token_display() {
    assert_eq!(format!("{}", ActionToken::Right), "RIGHT");
    assert_eq!(ActionToken::B.to_string(), "B");
}

// ===========================================================================
// InputPhase
// ===========================================================================

#[test]
fn input_phase_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&InputPhase::Press).unwrap(), r#""press""#);
    assert_eq!(serde_json::to_string(&InputPhase::Release).unwrap(), r#""release""#);
    assert_eq!(InputPhase::Release.to_string(), "release");
}

// ===========================================================================
// Frame
// ===========================================================================

#[test]
fn frame_base64() {
    let frame = Frame::new("image/png", vec![0, 1, 2]);
    assert_eq!(frame.to_base64(), "AAEC");
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_system_constructor() {
    let e = Error::system("step", "bridge closed");
    assert!(e.to_string().contains("step"));
    assert!(e.to_string().contains("bridge closed"));
    assert!(matches!(e, Error::SystemError { .. }));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let e: Error = io_err.into();
    assert!(matches!(e, Error::IoError(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let e: Error = json_err.into();
    assert!(matches!(e, Error::JsonError(_)));
}

#[test]
fn error_display_all_variants() {
    let errors: Vec<Error> = vec![
        Error::UnknownAction("x".into()),
        Error::system("op", "m"),
        Error::audio("x"),
        Error::ConfigError("x".into()),
    ];
    for e in errors {
        assert!(!format!("{}", e).is_empty());
    }
}
