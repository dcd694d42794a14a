use super::*;
use chrono::Duration;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn at(ms: i64) -> DateTime<Utc> {
    t0() + Duration::milliseconds(ms)
}

fn total_ms(session: &SessionController, region: &str) -> i64 {
    session.tracker().total(region).num_milliseconds()
}

// ============================================================================
// Enable / disable
// ============================================================================

#[test]
fn test_starts_disabled() {
    let mut session = SessionController::new();
    assert!(!session.is_enabled());
    assert_eq!(session.take_session_start(), None);
}

#[test]
fn test_enable_twice_keeps_first_start() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));
    session.set_enabled(true, at(500));

    assert!(session.is_enabled());
    assert_eq!(session.take_session_start(), Some(at(0)));
}

#[test]
fn test_take_session_start_is_single_use() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));

    assert_eq!(session.take_session_start(), Some(at(0)));
    assert_eq!(session.take_session_start(), None);
}

#[test]
fn test_disable_flushes_open_interval() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));
    session.feed_gaze("Windshield", GazeEventKind::Enter, at(200));

    session.set_enabled(false, at(900));

    assert_eq!(total_ms(&session, "Windshield"), 700);
    assert!(!session.tracker().is_active("Windshield"));
    assert_eq!(session.take_session_start(), None);
}

#[test]
fn test_disable_when_disabled_is_noop() {
    let mut session = SessionController::new();
    session.set_enabled(false, at(100));
    assert!(!session.is_enabled());
    assert_eq!(session.tracker().regions().count(), 0);
}

// ============================================================================
// Gaze gating and the session-start token
// ============================================================================

#[test]
fn test_gaze_dropped_while_disabled() {
    let mut session = SessionController::new();
    assert!(!session.feed_gaze("Windshield", GazeEventKind::Enter, at(0)));
    assert!(!session.feed_gaze("Windshield", GazeEventKind::Exit, at(100)));

    assert_eq!(total_ms(&session, "Windshield"), 0);
    assert!(!session.log().has_records());
}

#[test]
fn test_first_exit_after_enable_credits_since_start() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));

    assert!(session.feed_gaze("Windshield", GazeEventKind::Exit, at(1500)));

    assert_eq!(total_ms(&session, "Windshield"), 1500);
}

#[test]
fn test_session_start_consumed_by_any_region() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));

    session.feed_gaze("LeftMirror", GazeEventKind::Enter, at(100));
    session.feed_gaze("Windshield", GazeEventKind::Exit, at(300));

    assert_eq!(total_ms(&session, "Windshield"), 0);
    assert!(session.tracker().is_active("LeftMirror"));
}

#[test]
fn test_reenable_issues_fresh_start_token() {
    let mut session = SessionController::new();
    session.set_enabled(true, at(0));
    session.feed_gaze("A", GazeEventKind::Exit, at(100));
    session.set_enabled(false, at(200));
    session.set_enabled(true, at(1000));

    session.feed_gaze("A", GazeEventKind::Exit, at(1250));

    assert_eq!(total_ms(&session, "A"), 350);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_start_enter_exit_stop() {
    let mut session = SessionController::new();
    assert_eq!(session.handle_command("start", at(0)), CommandOutcome::Handled);
    session.feed_gaze("A", GazeEventKind::Enter, at(100));
    session.feed_gaze("A", GazeEventKind::Exit, at(400));

    assert_eq!(session.handle_command("stop", at(600)), CommandOutcome::Finalize);
    assert_eq!(total_ms(&session, "A"), 300);

    assert_eq!(session.handle_command("stop", at(900)), CommandOutcome::Finalize);
    assert_eq!(total_ms(&session, "A"), 300);
}

#[test]
fn test_stop_flushes_open_interval() {
    let mut session = SessionController::new();
    session.handle_command("start", at(0));
    session.feed_gaze("RearView", GazeEventKind::Enter, at(50));

    session.handle_command("stop", at(450));

    assert_eq!(total_ms(&session, "RearView"), 400);
    assert!(!session.is_enabled());
}

#[test]
fn test_pause_drops_following_gaze() {
    let mut session = SessionController::new();
    session.handle_command("start", at(0));
    session.feed_gaze("A", GazeEventKind::Enter, at(0));
    session.feed_gaze("A", GazeEventKind::Exit, at(100));

    assert_eq!(session.handle_command("pause now", at(100)), CommandOutcome::Handled);
    session.feed_gaze("A", GazeEventKind::Enter, at(200));
    session.feed_gaze("A", GazeEventKind::Exit, at(900));
    session.feed_gaze("B", GazeEventKind::Exit, at(950));

    assert_eq!(total_ms(&session, "A"), 100);
    assert_eq!(total_ms(&session, "B"), 0);
}

#[test]
fn test_continue_resumes_with_start_credit() {
    let mut session = SessionController::new();
    session.handle_command("start", at(0));
    session.handle_command("pause", at(100));
    session.handle_command("continue 1", at(1000));

    assert!(session.is_enabled());
    session.feed_gaze("Windshield", GazeEventKind::Exit, at(1200));
    assert_eq!(total_ms(&session, "Windshield"), 200);
}

#[test]
fn test_every_command_logged_once() {
    let mut session = SessionController::new();
    for raw in ["start", "start", "pause 1", "hello", "continue", "stop"] {
        session.handle_command(raw, at(0));
    }

    assert_eq!(session.command_count(), 6);
    assert_eq!(session.log().count(LogSource::Command), 5);
    assert_eq!(session.log().count(LogSource::Note), 1);

    let raw: Vec<&str> = session
        .log()
        .records()
        .iter()
        .map(|r| r.fields[0].as_str())
        .collect();
    assert_eq!(raw, vec!["start", "start", "pause 1", "hello", "continue", "stop"]);
}

#[test]
fn test_unrecognized_command_keeps_state() {
    let mut session = SessionController::new();
    session.handle_command("start", at(0));
    assert_eq!(session.handle_command("starting", at(10)), CommandOutcome::Handled);
    assert!(session.is_enabled());

    session.handle_command("pause", at(20));
    session.handle_command("stopper", at(30));
    assert!(!session.is_enabled());
}

// ============================================================================
// Summary
// ============================================================================

#[test]
fn test_summary_requires_enabled_session() {
    let mut session = SessionController::new();
    session.handle_command("hello", at(0));
    assert!(session.summarize(at(10)).is_none());

    session.handle_command("start", at(100));
    session.feed_gaze("A", GazeEventKind::Exit, at(150));
    session.handle_command("stop", at(200));

    let summary = session.summarize(at(200)).unwrap();
    assert_eq!(summary.started_at, at(100));
    assert_eq!(summary.command_count, 3);
    assert_eq!(summary.report.total_ms("A"), Some(50));
}
