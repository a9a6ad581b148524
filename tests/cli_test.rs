//! End-to-end tests for the `delayq` binary.

use std::process::{Command, Output};

use delayq::QueueConfig;
use delayq::event::{EventKind, QueueEvent};
use delayq::model::SlotId;

fn delayq(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_delayq"));
    cmd.args(args)
        // Keep a stray .env out of the picture.
        .current_dir(std::env::temp_dir())
        .env_remove("DELAYQ_CONFIG")
        .env_remove("DELAYQ_AUTO_ADVANCE")
        .env_remove("DELAYQ_DEFAULT_DELAY_MS")
        .env_remove("OTEL_ENDPOINT")
        .env("RUST_LOG", "info");
    cmd
}

fn run(args: &[&str]) -> Output {
    delayq(args).output().expect("failed to run delayq")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout is utf-8")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Rows of the release table: (slot, elapsed ms).
fn release_rows(stdout: &str) -> Vec<(String, u64)> {
    stdout
        .lines()
        .skip(2) // header + rule
        .map(|line| {
            let mut cols = line.split_whitespace();
            let slot = cols.next().expect("slot column").to_string();
            let ms = cols
                .next()
                .and_then(|c| c.strip_suffix("ms"))
                .and_then(|c| c.parse().ok())
                .unwrap_or_else(|| panic!("bad release row: {line:?}"));
            (slot, ms)
        })
        .collect()
}

fn events(stdout: &str) -> Vec<QueueEvent> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("non-JSON line {l:?}: {e}")))
        .collect()
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_advances_manually_in_enqueue_order() {
    let output = run(&["run", "--default-delay-ms", "5", "30", "0", "-"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows = release_rows(&stdout(&output));
    let slots: Vec<&str> = rows.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(slots, ["#1", "#2", "#3"]);

    // The 30ms slot holds back the shorter ones behind it.
    assert!(rows[0].1 >= 30, "rows: {rows:?}");
    assert!(rows[1].1 >= rows[0].1 && rows[2].1 >= rows[1].1 + 5, "rows: {rows:?}");
}

#[test]
fn run_auto_drains_without_manual_advance() {
    let output = run(&["run", "--auto", "10", "10"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows = release_rows(&stdout(&output));
    assert_eq!(rows.len(), 2);
    assert!(rows[1].1 >= 20, "rows: {rows:?}");
}

#[test]
fn run_json_prints_only_event_lines() {
    let output = run(&["run", "--json", "10", "20"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let kinds: Vec<(&'static str, SlotId)> = events(&stdout(&output))
        .into_iter()
        .map(|e| {
            let tag = match e.kind {
                EventKind::SlotEnqueued { .. } => "enqueued",
                EventKind::SlotStarted { .. } => "started",
                EventKind::SlotReleased { .. } => "released",
                EventKind::SlotAbandoned { .. } => "abandoned",
            };
            (tag, e.kind.slot())
        })
        .collect();
    assert_eq!(
        kinds,
        [
            ("enqueued", SlotId(1)),
            ("enqueued", SlotId(2)),
            ("started", SlotId(1)),
            ("released", SlotId(1)),
            ("started", SlotId(2)),
            ("released", SlotId(2)),
        ]
    );

    // Logs still happen, just not on stdout.
    assert!(stderr(&output).contains("state_transition"));
}

#[test]
fn run_dash_uses_default_delay() {
    let output = run(&["run", "--json", "--default-delay-ms", "40", "-", "3"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let delays: Vec<u64> = events(&stdout(&output))
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::SlotEnqueued { delay_ms, .. } => Some(delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, [40, 3]);
}

#[test]
fn run_rejects_negative_delay_before_enqueueing() {
    let output = run(&["run", "10", "-5"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid delay"), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty(), "nothing should run: {}", stdout(&output));
}

#[test]
fn run_rejects_unparsable_delay() {
    let output = run(&["run", "soon"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid delay 'soon'"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_prints_effective_toml() {
    let output = delayq(&["config"])
        .env("DELAYQ_AUTO_ADVANCE", "true")
        .env("DELAYQ_DEFAULT_DELAY_MS", "250")
        .output()
        .expect("failed to run delayq");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let parsed = QueueConfig::from_toml_str(&stdout(&output)).unwrap();
    assert_eq!(
        parsed,
        QueueConfig {
            auto_advance: true,
            default_delay_ms: 250,
        }
    );
}
