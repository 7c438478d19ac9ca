mod common;

use common::{
    ScriptedSource, TransitionCall, WAIT, press, press_times, settle, started, type_text,
};
use crossterm::event::KeyCode;
use pipescope::modal::ModalState;
use pipescope::source::demo;
use std::time::Duration;

/// Coordinator on the prod-api pipeline with its stages loaded
fn on_failing_pipeline(source: std::sync::Arc<ScriptedSource>) -> pipescope::coordinator::Coordinator {
    let mut coordinator = started(source);
    // prod-api sorts last
    coordinator.handle_key(press(KeyCode::End));
    coordinator.handle_key(press(KeyCode::Enter));
    assert_eq!(coordinator.nav().current_label(), demo::FAILING_PIPELINE);
    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    settle(&coordinator);
    coordinator
}

#[test]
fn test_declined_start_sends_nothing() {
    let source = ScriptedSource::new();
    let mut coordinator = started(source.clone());

    coordinator.handle_key(press(KeyCode::Char('s')));
    assert!(coordinator.overlay().is_pending());
    assert_eq!(coordinator.status_line(80), "Start pipeline demo-pipeline? (y/n)");

    coordinator.handle_key(press(KeyCode::Char('n')));
    assert_eq!(coordinator.overlay().state(), &ModalState::Idle);
    assert!(coordinator.pump(Duration::from_millis(200)).is_none());
    assert_eq!(ScriptedSource::count(&source.calls.start), 0);
}

#[test]
fn test_confirmed_start_refreshes_listing() {
    let source = ScriptedSource::new();
    let mut coordinator = started(source.clone());

    coordinator.handle_key(press(KeyCode::Char('s')));
    // Keys other than y/n leave the prompt open
    coordinator.handle_key(press(KeyCode::Char('x')));
    assert!(coordinator.overlay().is_pending());
    coordinator.handle_key(press(KeyCode::Char('y')));
    assert!(!coordinator.overlay().is_pending());

    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    assert_eq!(ScriptedSource::count(&source.calls.start), 1);
    assert_eq!(ScriptedSource::count(&source.calls.list), 2);
}

#[test]
fn test_keys_go_to_prompt_while_pending() {
    let source = ScriptedSource::new();
    let mut coordinator = started(source);

    coordinator.handle_key(press(KeyCode::Char('/')));
    type_text(&mut coordinator, "q?");
    assert!(!coordinator.should_quit());
    assert!(!coordinator.full_help());
    assert_eq!(coordinator.status_line(80), "/q?");

    coordinator.handle_key(press(KeyCode::Esc));
    assert!(!coordinator.overlay().is_pending());
}

#[test]
fn test_retry_failed_action() {
    let source = ScriptedSource::new();
    let mut coordinator = on_failing_pipeline(source.clone());

    // Source, Checkout, spacer, transition, spacer, Test, Unit, Integration
    press_times(&mut coordinator, KeyCode::Down, 7);
    coordinator.handle_key(press(KeyCode::Char('S')));
    assert_eq!(coordinator.status_line(80), "Retry stage Test? (y/n)");
    coordinator.handle_key(press(KeyCode::Char('y')));

    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    assert_eq!(ScriptedSource::count(&source.calls.retry), 1);
    assert!(coordinator.overlay().notice().is_none());
}

#[test]
fn test_retry_refused_for_succeeded_action() {
    let source = ScriptedSource::new();
    let mut coordinator = on_failing_pipeline(source.clone());

    press_times(&mut coordinator, KeyCode::Down, 6);
    coordinator.handle_key(press(KeyCode::Char('S')));
    assert!(!coordinator.overlay().is_pending());
    assert_eq!(
        coordinator.overlay().notice(),
        Some("Can't restart a stage that has not failed.")
    );
    assert_eq!(ScriptedSource::count(&source.calls.retry), 0);
}

#[test]
fn test_disable_transition_with_reason() {
    let source = ScriptedSource::new();
    let mut coordinator = on_failing_pipeline(source.clone());

    press_times(&mut coordinator, KeyCode::Down, 3);
    coordinator.handle_key(press(KeyCode::Char('t')));
    type_text(&mut coordinator, "freeze");
    assert_eq!(
        coordinator.status_line(80),
        "Disable transition into Test, reason (empty to cancel): freeze"
    );
    coordinator.handle_key(press(KeyCode::Enter));

    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    settle(&coordinator);
    assert_eq!(
        source.transitions(),
        vec![TransitionCall {
            pipeline: demo::FAILING_PIPELINE.to_string(),
            stage: "Test".to_string(),
            enabled: false,
            reason: Some("freeze".to_string()),
        }]
    );

    // Now disabled, so the same key offers to enable it again
    coordinator.handle_key(press(KeyCode::Char('t')));
    assert_eq!(coordinator.status_line(80), "Enable transition into Test? (y/n)");
    coordinator.handle_key(press(KeyCode::Char('y')));
    assert_eq!(coordinator.pump(WAIT), Some("viewUpdate"));
    assert_eq!(source.transitions().len(), 2);
    assert!(source.transitions()[1].enabled);
}

#[test]
fn test_empty_reason_cancels_disable() {
    let source = ScriptedSource::new();
    let mut coordinator = on_failing_pipeline(source.clone());

    press_times(&mut coordinator, KeyCode::Down, 3);
    coordinator.handle_key(press(KeyCode::Char('t')));
    coordinator.handle_key(press(KeyCode::Char('x')));
    coordinator.handle_key(press(KeyCode::Backspace));
    coordinator.handle_key(press(KeyCode::Enter));

    assert!(!coordinator.overlay().is_pending());
    assert!(coordinator.pump(Duration::from_millis(200)).is_none());
    assert_eq!(ScriptedSource::count(&source.calls.transition), 0);
}
