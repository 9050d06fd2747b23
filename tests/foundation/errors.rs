//! Integration tests for Error types

use normcache::foundation::{Error, ErrorContext, ErrorKind};

#[test]
fn errors_render_their_kind() {
    let err = Error::missing_key_field("Book", "isbn");
    assert_eq!(
        err.to_string(),
        "missing field isbn while extracting key fields for Book"
    );
    assert!(err.is_policy_failure());
    assert!(!Error::invalid_merge_target("x").is_policy_failure());
}

#[test]
fn replay_failures_name_the_layer() {
    let source = Error::policy_failure("boom");
    let err = Error::replay_failed("opt-1", &source);
    let ErrorKind::ReplayFailed { layer, message } = &err.kind else {
        panic!("expected ReplayFailed, got {:?}", err.kind);
    };
    assert_eq!(layer, "opt-1");
    assert!(message.contains("boom"));
}

#[test]
fn context_accumulates_frames() {
    let context = ErrorContext::new()
        .with_entity("Item:1")
        .with_field("tags")
        .with_frame("merge")
        .with_frame("drop_field");
    let err = Error::policy_failure("nope").with_context(context);
    let context = err.context.unwrap();
    assert_eq!(context.stack, vec!["merge", "drop_field"]);
    let rendered = context.to_string();
    assert!(rendered.starts_with("at Item:1.tags"));
    assert!(rendered.contains("in drop_field"));
}
