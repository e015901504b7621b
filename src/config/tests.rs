use super::*;
use crate::method::LockMethod;
use std::time::Duration;

fn settings(read: &str, write: &str) -> LockSettings {
    LockSettings {
        read_locks: read.to_string(),
        write_locks: write.to_string(),
        ..LockSettings::default()
    }
}

#[test]
fn default_settings_resolve() {
    let config = LockConfig::resolve(&LockSettings::default()).unwrap();
    assert_eq!(config.shared_methods(), &[LockMethod::Fcntl]);
    assert_eq!(
        config.exclusive_methods(),
        &[LockMethod::Dotlock, LockMethod::Fcntl]
    );
    assert_eq!(config.wait_timeout(), Duration::from_secs(600));
    assert_eq!(config.stale_threshold(), Duration::from_secs(300));
}

#[test]
fn default_config_matches_resolved_defaults() {
    let resolved = LockConfig::resolve(&LockSettings::default()).unwrap();
    let default = LockConfig::default();
    assert_eq!(default.shared_methods(), resolved.shared_methods());
    assert_eq!(default.exclusive_methods(), resolved.exclusive_methods());
    assert_eq!(default.wait_timeout(), resolved.wait_timeout());
    assert_eq!(default.stale_threshold(), resolved.stale_threshold());
}

#[test]
fn exclusive_superset_is_accepted() {
    let config = LockConfig::resolve(&settings("fcntl", "dotlock fcntl flock")).unwrap();
    assert_eq!(config.exclusive_methods().len(), 3);
}

#[test]
fn identical_lists_are_accepted() {
    assert!(LockConfig::resolve(&settings("fcntl flock", "fcntl flock")).is_ok());
}

#[test]
fn empty_shared_list_is_accepted() {
    let config = LockConfig::resolve(&settings("", "dotlock fcntl")).unwrap();
    assert!(config.shared_methods().is_empty());
}

#[test]
fn missing_shared_method_is_rejected() {
    let err = LockConfig::resolve(&settings("flock", "dotlock fcntl")).unwrap_err();
    assert!(err.to_string().contains("inconsistent"));
}

#[test]
fn reordered_lists_are_rejected() {
    // Same sets, different relative order.
    let err = LockConfig::resolve(&settings("flock fcntl", "fcntl flock")).unwrap_err();
    assert!(err.to_string().contains("inconsistent"));
}

#[test]
fn unknown_method_is_rejected() {
    let err = LockConfig::resolve(&settings("posix", "posix")).unwrap_err();
    assert!(err.to_string().contains("read_locks"));
}

#[test]
fn duplicate_method_is_rejected() {
    let err = LockConfig::resolve(&settings("fcntl", "dotlock dotlock fcntl")).unwrap_err();
    assert!(err.to_string().contains("write_locks"));
}

#[test]
fn settings_deserialize_with_defaults() {
    let parsed: LockSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed.read_locks, "fcntl");
    assert_eq!(parsed.write_locks, "dotlock fcntl");
    assert_eq!(parsed.lock_timeout_secs, 600);
    assert_eq!(parsed.dotlock_change_timeout_secs, 300);

    let parsed: LockSettings =
        serde_json::from_str(r#"{"write_locks": "dotlock flock", "lock_timeout_secs": 30}"#)
            .unwrap();
    assert_eq!(parsed.write_locks, "dotlock flock");
    assert_eq!(parsed.lock_timeout_secs, 30);
}
