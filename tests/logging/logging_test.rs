//! Tests for `src/logging.rs`.

use agent_architect::logging::{log_file_prefix, LoggingGuard};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn log_file_prefix_is_file_name_safe() {
    assert_eq!(log_file_prefix("test"), "test");
    assert_eq!(log_file_prefix(" Build "), "build");
    assert_eq!(log_file_prefix("chat/social"), "chat-social");
    assert_eq!(log_file_prefix("../"), "session");
    assert_eq!(log_file_prefix(""), "session");
}

#[test]
fn init_session_writes_a_log_named_after_the_command() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("tempdir should be created: {err}"),
    };
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can be installed once per process; this is the
    // only test in this binary that installs it.
    let guard = match agent_architect::logging::init_session(&logs_dir, "test") {
        Ok(guard) => guard,
        Err(err) => panic!("session logging should start: {err}"),
    };
    assert_eq!(guard.session_id().len(), 32);
    drop(guard);

    let names: Vec<String> = match std::fs::read_dir(&logs_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(err) => panic!("logs directory should exist: {err}"),
    };
    assert_eq!(names.len(), 1, "files: {names:?}");
    assert!(names[0].starts_with("test."), "file: {}", names[0]);
    assert!(names[0].ends_with(".log"), "file: {}", names[0]);
}
