//! Recorded work-tracking events and the tasks they belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_kind::EventKind;
use crate::types::{EventId, TaskId};

/// A single start/stop marker for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: EventId,
    /// The task this event belongs to.
    pub task: TaskId,
    /// When the event occurred.
    pub instant: DateTime<Utc>,
    /// What the event marks.
    pub kind: EventKind,
    /// Optional free-text note entered with the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Event {
    /// Creates an event without a note.
    pub fn new(id: EventId, task: TaskId, instant: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id,
            task,
            instant,
            kind,
            note: None,
        }
    }
}

/// An activity that time is tracked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Inactive tasks are kept for old events but hidden from selection.
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::new(
            EventId::new("evt-1").unwrap(),
            TaskId::new("task-a").unwrap(),
            Utc::now(),
            EventKind::Start,
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("note"));
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, event);
    }

    #[test]
    fn event_rejects_empty_task() {
        let json = r#"{
            "id": "evt-1",
            "task": "",
            "instant": "2024-01-01T00:00:00Z",
            "kind": "start"
        }"#;
        let result: Result<Event, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn task_defaults_to_active() {
        let task: Task = serde_json::from_str(r#"{"id": "t1", "name": "Support"}"#).unwrap();
        assert!(task.active);
    }
}
