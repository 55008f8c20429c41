use movable::config::{AreaOptions, ItemOptions};
use movable::geometry::{ItemSize, ItemTransform};
use serde_json::Value;

use super::*;

fn area() -> AreaController {
    let mut area = AreaController::new(AreaOptions::new(400.0, 300.0));
    area.add_item(ItemOptions {
        initial: ItemTransform::new(0.0, 0.0, 1.0),
        size: Some(ItemSize::new(100.0, 100.0)),
        ..ItemOptions::default()
    });
    area
}

fn replay(trace: &str, quiet: bool) -> (Result<Summary, CliError>, Vec<Value>) {
    let mut area = area();
    let mut out = Vec::new();
    let result = Replay::new(&mut area, &mut out, quiet).run(trace.as_bytes());
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (result, lines)
}

fn item_event_types(lines: &[Value]) -> Vec<&str> {
    lines.iter().filter_map(|line| line["event"]["type"].as_str()).collect()
}

#[test]
fn tap_trace_emits_focus_and_tap() {
    let trace = r#"
# a short still press
{"t_ms": 0, "type": "pointer_down", "item": 0, "pointer": 1, "x": 50, "y": 50}
{"t_ms": 80, "type": "pointer_up", "pointer": 1, "x": 50, "y": 50}
"#;
    let (result, lines) = replay(trace, false);
    let summary = result.unwrap();

    assert_eq!(lines[0]["type"], "focus_changed");
    assert_eq!(lines[0]["t_ms"], 0);
    let types = item_event_types(&lines);
    assert!(types.contains(&"tap"), "{types:?}");
    assert_eq!(types.last(), Some(&"capture_released"));
    assert_eq!(summary.inputs, 2);
    assert_eq!(summary.events, lines.len());
    assert_eq!(summary.end_ms, 80);
    assert_eq!(summary.items[0].state, ItemTransform::new(0.0, 0.0, 1.0));
}

#[test]
fn deadlines_run_at_their_own_timestamps() {
    let trace = r#"
{"t_ms": 0, "type": "pointer_down", "item": 0, "pointer": 1, "x": 50, "y": 50}
{"t_ms": 10, "type": "pointer_move", "pointer": 1, "x": 90, "y": 50}
{"t_ms": 50, "type": "pointer_up", "pointer": 1, "x": 90, "y": 50}
"#;
    let (result, lines) = replay(trace, false);
    let summary = result.unwrap();

    let moving = lines.iter().find(|line| line["event"]["type"] == "moving").unwrap();
    assert_eq!(moving["t_ms"], 11);
    assert!(lines.iter().any(|line| line["event"]["type"] == "move_end" && line["t_ms"] == 50));
    assert!((summary.items[0].state.x - 0.1).abs() < 1e-9);
}

#[test]
fn pending_zoom_is_drained_after_last_line() {
    let trace = r#"{"t_ms": 0, "type": "wheel", "item": 0, "x": 50, "y": 50, "delta_y": -3}"#;
    let (result, lines) = replay(trace, false);
    let summary = result.unwrap();

    let last = lines.last().unwrap();
    assert_eq!(last["event"]["type"], "zoom_end");
    assert_eq!(last["t_ms"], 150);
    assert_eq!(summary.end_ms, 150);
    assert_eq!(summary.items[0].state.scale, 1.25);
}

#[test]
fn quiet_mode_only_counts() {
    let trace = r#"
{"t_ms": 0, "type": "pointer_down", "item": 0, "pointer": 1, "x": 50, "y": 50}
{"t_ms": 80, "type": "pointer_up", "pointer": 1, "x": 50, "y": 50}
"#;
    let (result, lines) = replay(trace, true);
    assert!(lines.is_empty());
    assert!(result.unwrap().events > 0);
}

#[test]
fn backwards_timestamp_is_rejected() {
    let trace = r#"
{"t_ms": 10, "type": "pointer_cancel", "pointer": 1}
{"t_ms": 5, "type": "pointer_cancel", "pointer": 1}
"#;
    let (result, _) = replay(trace, false);
    assert!(matches!(result, Err(CliError::Backwards { line: 3, t_ms: 5, last_ms: 10 })));
}

#[test]
fn malformed_line_reports_its_number() {
    let trace = "# header\n\n{\"t_ms\": 0, \"type\": \"teleport\"}\n";
    let (result, _) = replay(trace, false);
    let err = result.unwrap_err();
    assert!(matches!(err, CliError::Trace { line: 3, .. }));
    assert!(err.to_string().starts_with("trace line 3:"));
}
