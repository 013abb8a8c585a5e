//! Wire events from the agent-run stream.
//!
//! The upstream service emits newline-delimited JSON, one envelope per line:
//! `{"value": {"type": "generation", "state": "start", "label": "NEXT", ...}}`.
//! Some stream revisions put the `type`/`value` pair at the top level instead
//! of nesting it under `value`; both shapes are accepted, preferring the
//! nested object when present.

use tracing::{trace, warn};

/// One parsed event from the run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A new generation step began.
    GenerationStart {
        label: String,
        thought: String,
        action: String,
        input: String,
    },
    /// The most recent generation step finished.
    GenerationEnd { label: Option<String> },
    /// Incremental thought text for the most recent generation.
    Chunk {
        value: String,
        action: Option<String>,
        input: Option<String>,
    },
    /// The run's final outputs object. Carried for display/logging only.
    Outputs(serde_json::Value),
}

/// Parse one stream line into a [`RunEvent`].
///
/// Returns `None` for blank lines, malformed JSON (logged and skipped — the
/// stream continues), and unrecognized event types.
pub fn parse_line(line: &str) -> Option<RunEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let root: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, line, "Skipping malformed stream line");
            return None;
        }
    };

    let payload = match root.get("value") {
        Some(v) if v.is_object() => v,
        // Top-level type/value pair (older stream shape).
        _ if root.get("type").is_some() => &root,
        _ => {
            trace!(line, "Line carries no event payload");
            return None;
        }
    };

    match payload.get("type").and_then(|t| t.as_str()) {
        Some("generation") => {
            let state = payload.get("state").and_then(|s| s.as_str());
            if state == Some("start") {
                Some(RunEvent::GenerationStart {
                    label: str_field(payload, "label"),
                    thought: str_field(payload, "thought"),
                    action: str_field(payload, "action"),
                    input: str_field(payload, "input"),
                })
            } else {
                // Anything other than an explicit start closes the step.
                Some(RunEvent::GenerationEnd {
                    label: opt_str_field(payload, "label"),
                })
            }
        }
        Some("chunk") => Some(RunEvent::Chunk {
            value: str_field(payload, "value"),
            action: opt_str_field(payload, "action"),
            input: opt_str_field(payload, "input"),
        }),
        Some("outputs") => Some(RunEvent::Outputs(payload.clone())),
        other => {
            trace!(event_type = ?other, "Ignoring unrecognized event type");
            None
        }
    }
}

fn str_field(payload: &serde_json::Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn opt_str_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generation_start() {
        let line = r#"{"value":{"type":"generation","state":"start","label":"NEXT","thought":"t","action":"a","input":"i"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            RunEvent::GenerationStart {
                label: "NEXT".into(),
                thought: "t".into(),
                action: "a".into(),
                input: "i".into(),
            }
        );
    }

    #[test]
    fn test_parse_generation_start_defaults_missing_fields() {
        let line = r#"{"value":{"type":"generation","state":"start","label":"ANSWER"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            RunEvent::GenerationStart {
                label: "ANSWER".into(),
                thought: String::new(),
                action: String::new(),
                input: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_generation_end() {
        let line = r#"{"value":{"type":"generation","state":"end","label":"NEXT"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(event, RunEvent::GenerationEnd { label: Some("NEXT".into()) });
    }

    #[test]
    fn test_parse_generation_without_state_is_end() {
        let line = r#"{"value":{"type":"generation"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(event, RunEvent::GenerationEnd { label: None });
    }

    #[test]
    fn test_parse_chunk() {
        let line = r#"{"value":{"type":"chunk","value":"partial text","action":"lookup"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            RunEvent::Chunk {
                value: "partial text".into(),
                action: Some("lookup".into()),
                input: None,
            }
        );
    }

    #[test]
    fn test_parse_chunk_missing_value_is_empty() {
        let line = r#"{"value":{"type":"chunk"}}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            RunEvent::Chunk {
                value: String::new(),
                action: None,
                input: None,
            }
        );
    }

    #[test]
    fn test_parse_top_level_envelope_variant() {
        // Older revisions skip the outer {"value": ...} nesting.
        let line = r#"{"type":"chunk","value":"hi"}"#;
        let event = parse_line(line).unwrap();
        assert_eq!(
            event,
            RunEvent::Chunk {
                value: "hi".into(),
                action: None,
                input: None,
            }
        );
    }

    #[test]
    fn test_nested_object_preferred_over_top_level_type() {
        // Both shapes structurally present: the nested object wins.
        let line = r#"{"type":"chunk","value":{"type":"generation","state":"start","label":"A"}}"#;
        let event = parse_line(line).unwrap();
        assert!(matches!(event, RunEvent::GenerationStart { ref label, .. } if label == "A"));
    }

    #[test]
    fn test_parse_outputs() {
        let line = r#"{"value":{"type":"outputs","answer":"42"}}"#;
        let event = parse_line(line).unwrap();
        match event {
            RunEvent::Outputs(v) => assert_eq!(v["answer"], "42"),
            other => panic!("expected outputs, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        assert!(parse_line("not-json").is_none());
        assert!(parse_line("{\"value\": ").is_none());
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_scalar_value_without_type_is_ignored() {
        assert!(parse_line(r#"{"value": "just a string"}"#).is_none());
        assert!(parse_line(r#"{"unrelated": true}"#).is_none());
    }

    #[test]
    fn test_unrecognized_type_is_ignored() {
        assert!(parse_line(r#"{"value":{"type":"prompt","value":"x"}}"#).is_none());
    }
}
