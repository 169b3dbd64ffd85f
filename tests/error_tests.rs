//! 错误处理模块测试

use l7_detector::error::ClassifierError;
use std::path::PathBuf;

#[test]
fn test_error_creation() {
    let err = ClassifierError::malformed_packet("truncated TCP header");
    assert!(matches!(err, ClassifierError::MalformedPacket { .. }));
    assert!(err.is_recoverable());
    assert!(!err.is_fatal());
}

#[test]
fn test_error_codes() {
    assert_eq!(ClassifierError::NoValidRules.error_code(), 1002);
    assert_eq!(ClassifierError::pattern_compile("http", "bad").error_code(), 1007);
    assert_eq!(ClassifierError::UnsupportedTransport(1).error_code(), 2002);
}

#[test]
fn test_error_display() {
    let err = ClassifierError::SignatureNotFound {
        protocol: "http".to_string(),
        root: PathBuf::from("/etc/l7-protocols"),
    };
    let display = format!("{}", err);
    assert!(display.contains("http"));
    assert!(display.contains("/etc/l7-protocols"));

    let err = ClassifierError::UnknownFlag {
        path: PathBuf::from("x.pat"),
        token: "REG_BOGUS".to_string(),
    };
    assert!(err.to_string().contains("REG_BOGUS"));
}

#[test]
fn test_startup_errors_are_fatal() {
    let fatal = [
        ClassifierError::NoValidRules,
        ClassifierError::MissingPattern {
            path: PathBuf::from("x.pat"),
        },
        ClassifierError::ProtocolMismatch {
            path: PathBuf::from("x.pat"),
            expected: "x".to_string(),
            found: "y".to_string(),
        },
        ClassifierError::pattern_compile("x", "unmatched ("),
        ClassifierError::config_error("bad mask"),
    ];
    for err in &fatal {
        assert!(err.is_fatal(), "{} should be fatal", err);
        assert!(!err.is_recoverable());
    }
}

#[test]
fn test_runtime_errors_are_recoverable() {
    assert!(ClassifierError::UnsupportedTransport(47).is_recoverable());
    assert!(ClassifierError::malformed_packet("x").is_recoverable());
    assert!(!ClassifierError::internal_error("x").is_recoverable());
    assert!(!ClassifierError::internal_error("x").is_fatal());
}

#[test]
fn test_config_error_classification() {
    assert!(ClassifierError::config_error("test").is_config_error());
    assert!(ClassifierError::NoValidRules.is_config_error());
    assert!(!ClassifierError::pattern_compile("x", "y").is_config_error());
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
    let err: ClassifierError = json_err.into();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("JSON error"));
}
