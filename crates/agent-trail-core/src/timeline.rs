//! Generation records and the run timeline reducer.

use serde::{Deserialize, Serialize};

use crate::event::RunEvent;

/// One step of agent reasoning.
///
/// `thought` accumulates as chunk events arrive and may itself hold a
/// serialized JSON object with `thought`/`action`/`input` sub-fields; callers
/// that want the inner text decode it lazily via [`Generation::inner_thought`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub label: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl Generation {
    /// The `thought` sub-field when the accumulated text is a JSON object,
    /// otherwise the raw accumulated text.
    pub fn inner_thought(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.thought)
            .ok()
            .and_then(|v| v.get("thought").and_then(|t| t.as_str()).map(str::to_string))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.thought.clone())
    }
}

/// Lifecycle of one question/run, driven by a single sequential reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed | RunPhase::Aborted)
    }
}

/// Ordered list of generations for one run.
///
/// At most one generation is open (not completed) at a time: the last one.
/// Start events append, chunk and end events target the last element, and
/// events arriving before any start are dropped. The list is reset when a new
/// question is submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    generations: Vec<Generation>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Drop all generations (a new question was submitted).
    pub fn clear(&mut self) {
        self.generations.clear();
    }

    /// Apply one stream event.
    ///
    /// Never panics: events that do not match the list's current state (a
    /// chunk or end with nothing open) are no-ops.
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::GenerationStart {
                label,
                thought,
                action,
                input,
            } => {
                self.generations.push(Generation {
                    label: label.clone(),
                    thought: thought.clone(),
                    action: action.clone(),
                    input: input.clone(),
                    is_completed: false,
                });
            }
            RunEvent::GenerationEnd { .. } => {
                if let Some(last) = self.generations.last_mut() {
                    last.is_completed = true;
                }
            }
            RunEvent::Chunk {
                value,
                action,
                input,
            } => {
                if let Some(last) = self.generations.last_mut() {
                    last.thought.push_str(value);
                    // First non-empty value wins; later chunks never overwrite.
                    if last.action.is_empty() {
                        if let Some(action) = action.as_deref().filter(|a| !a.is_empty()) {
                            last.action = action.to_string();
                        }
                    }
                    if last.input.is_empty() {
                        if let Some(input) = input.as_deref().filter(|i| !i.is_empty()) {
                            last.input = input.to_string();
                        }
                    }
                }
            }
            RunEvent::Outputs(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse_line;

    fn start(label: &str) -> RunEvent {
        RunEvent::GenerationStart {
            label: label.into(),
            thought: String::new(),
            action: String::new(),
            input: String::new(),
        }
    }

    fn chunk(value: &str) -> RunEvent {
        RunEvent::Chunk {
            value: value.into(),
            action: None,
            input: None,
        }
    }

    #[test]
    fn test_start_chunk_chunk_end() {
        let mut timeline = Timeline::new();
        timeline.apply(&start("A"));
        timeline.apply(&chunk("hel"));
        timeline.apply(&chunk("lo"));
        timeline.apply(&RunEvent::GenerationEnd { label: None });

        assert_eq!(timeline.len(), 1);
        let generation = &timeline.generations()[0];
        assert_eq!(generation.label, "A");
        assert_eq!(generation.thought, "hello");
        assert!(generation.is_completed);
    }

    #[test]
    fn test_chunk_before_start_is_noop() {
        let mut timeline = Timeline::new();
        timeline.apply(&chunk("orphan"));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_end_before_start_is_noop() {
        let mut timeline = Timeline::new();
        timeline.apply(&RunEvent::GenerationEnd { label: Some("X".into()) });
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_outputs_event_is_noop() {
        let mut timeline = Timeline::new();
        timeline.apply(&start("A"));
        let before = timeline.clone();
        timeline.apply(&RunEvent::Outputs(serde_json::json!({"answer": 1})));
        assert_eq!(timeline, before);
    }

    #[test]
    fn test_first_nonempty_action_wins() {
        let mut timeline = Timeline::new();
        timeline.apply(&start("A"));
        timeline.apply(&RunEvent::Chunk {
            value: String::new(),
            action: Some("X".into()),
            input: None,
        });
        timeline.apply(&RunEvent::Chunk {
            value: String::new(),
            action: Some("Y".into()),
            input: None,
        });
        assert_eq!(timeline.generations()[0].action, "X");
    }

    #[test]
    fn test_empty_action_does_not_claim_first_write() {
        let mut timeline = Timeline::new();
        timeline.apply(&start("A"));
        timeline.apply(&RunEvent::Chunk {
            value: String::new(),
            action: Some(String::new()),
            input: None,
        });
        timeline.apply(&RunEvent::Chunk {
            value: String::new(),
            action: Some("real".into()),
            input: None,
        });
        assert_eq!(timeline.generations()[0].action, "real");
    }

    #[test]
    fn test_start_action_survives_chunk_backfill() {
        let mut timeline = Timeline::new();
        timeline.apply(&RunEvent::GenerationStart {
            label: "A".into(),
            thought: String::new(),
            action: "from-start".into(),
            input: String::new(),
        });
        timeline.apply(&RunEvent::Chunk {
            value: String::new(),
            action: Some("late".into()),
            input: None,
        });
        assert_eq!(timeline.generations()[0].action, "from-start");
    }

    #[test]
    fn test_second_start_leaves_previous_untouched() {
        let mut timeline = Timeline::new();
        timeline.apply(&start("A"));
        timeline.apply(&chunk("one"));
        timeline.apply(&RunEvent::GenerationEnd { label: None });
        timeline.apply(&start("B"));
        timeline.apply(&chunk("two"));

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.generations()[0].thought, "one");
        assert!(timeline.generations()[0].is_completed);
        assert_eq!(timeline.generations()[1].thought, "two");
        assert!(!timeline.generations()[1].is_completed);
    }

    #[test]
    fn test_end_to_end_stream() {
        let stream = concat!(
            r#"{"value":{"type":"generation","state":"start","label":"NEXT"}}"#,
            "\n",
            r#"{"value":{"type":"chunk","value":"{\"thought\":\"checking price\"}"}}"#,
            "\n",
            r#"{"value":{"type":"generation","state":"end"}}"#,
            "\n",
        );

        let mut timeline = Timeline::new();
        for line in stream.lines() {
            if let Some(event) = parse_line(line) {
                timeline.apply(&event);
            }
        }

        assert_eq!(timeline.len(), 1);
        let generation = &timeline.generations()[0];
        assert_eq!(generation.label, "NEXT");
        assert_eq!(generation.thought, r#"{"thought":"checking price"}"#);
        assert!(generation.is_completed);
        assert_eq!(generation.inner_thought(), "checking price");
    }

    #[test]
    fn test_malformed_line_does_not_corrupt_neighbors() {
        let lines = [
            r#"{"value":{"type":"generation","state":"start","label":"A"}}"#,
            "not-json",
            r#"{"value":{"type":"chunk","value":"ok"}}"#,
        ];

        let mut timeline = Timeline::new();
        for line in lines {
            if let Some(event) = parse_line(line) {
                timeline.apply(&event);
            }
        }

        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.generations()[0].thought, "ok");
    }

    #[test]
    fn test_generation_serializes_camel_case() {
        let generation = Generation {
            label: "NEXT".into(),
            thought: "t".into(),
            action: String::new(),
            input: String::new(),
            is_completed: true,
        };
        let json = serde_json::to_string(&generation).unwrap();
        assert!(json.contains("\"isCompleted\":true"));
    }

    #[test]
    fn test_inner_thought_plain_text_passthrough() {
        let generation = Generation {
            thought: "plain reasoning".into(),
            ..Generation::default()
        };
        assert_eq!(generation.inner_thought(), "plain reasoning");
    }

    #[test]
    fn test_run_phase_terminality() {
        assert!(!RunPhase::Idle.is_terminal());
        assert!(!RunPhase::Sending.is_terminal());
        assert!(!RunPhase::Streaming.is_terminal());
        assert!(RunPhase::Completed.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(RunPhase::Aborted.is_terminal());
    }
}
