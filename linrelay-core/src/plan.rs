//! Plan reducer
//!
//! Mirrors the agent's task/todo tool results onto an insertion-ordered
//! task map. The map key is the task id (stringified array index for
//! todo lists); insertion order is the presentation order and survives
//! in-place updates.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

use crate::activity::{PlanItem, PlanItemStatus};

static TASK_ID_IN_RESULT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Task #(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq)]
struct TaskEntry {
    content: String,
    status: String,
}

/// Ordered task map driven by non-error TaskCreate/TaskUpdate/TodoWrite
/// results observed mid-stream.
#[derive(Debug, Default)]
pub struct PlanTracker {
    tasks: IndexMap<String, TaskEntry>,
}

impl PlanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the task announced by a `TaskCreate` result.
    ///
    /// The assigned id only exists in the result text (`Task #N`); a result
    /// without it is ignored.
    pub fn handle_task_create(&mut self, input: &Value, result_text: &str) {
        let Some(captures) = TASK_ID_IN_RESULT.captures(result_text) else {
            return;
        };
        let task_id = captures[1].to_string();
        self.tasks.insert(
            task_id,
            TaskEntry {
                content: str_field(input, "subject"),
                status: "pending".to_string(),
            },
        );
    }

    /// Apply a `TaskUpdate` input to an existing task; unknown ids are
    /// ignored, `status = "deleted"` removes the entry.
    pub fn handle_task_update(&mut self, input: &Value) {
        let task_id = str_field(input, "taskId");

        if input.get("status").and_then(Value::as_str) == Some("deleted") {
            self.tasks.shift_remove(&task_id);
            return;
        }

        let Some(entry) = self.tasks.get_mut(&task_id) else {
            return;
        };
        if let Some(status) = input.get("status").and_then(Value::as_str) {
            entry.status = status.to_string();
        }
        if let Some(subject) = input.get("subject").and_then(Value::as_str) {
            entry.content = subject.to_string();
        }
    }

    /// Replace the whole map from a `TodoWrite` input. A missing `todos`
    /// array leaves the map cleared.
    pub fn handle_todo_write(&mut self, input: &Value) {
        self.tasks.clear();
        let Some(todos) = input.get("todos").and_then(Value::as_array) else {
            return;
        };
        for (index, todo) in todos.iter().enumerate() {
            let content = todo
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let status = todo
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("pending")
                .to_string();
            self.tasks
                .insert(index.to_string(), TaskEntry { content, status });
        }
    }

    pub fn has_plan(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Flattened plan in insertion order, statuses projected onto the
    /// tracker's vocabulary.
    pub fn snapshot(&self) -> Vec<PlanItem> {
        self.tasks
            .values()
            .map(|entry| PlanItem {
                content: entry.content.clone(),
                status: project_status(&entry.status),
            })
            .collect()
    }
}

fn project_status(status: &str) -> PlanItemStatus {
    match status {
        "in_progress" => PlanItemStatus::InProgress,
        "completed" => PlanItemStatus::Completed,
        "deleted" => PlanItemStatus::Canceled,
        _ => PlanItemStatus::Pending,
    }
}

fn str_field(input: &Value, key: &str) -> String {
    input
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_create_parses_id_from_result() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "Fix parser"}), "Created Task #3 for you");

        assert!(plan.has_plan());
        let snapshot = plan.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "Fix parser");
        assert_eq!(snapshot[0].status, PlanItemStatus::Pending);
    }

    #[test]
    fn test_task_create_without_id_is_ignored() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "Fix parser"}), "ok");
        assert!(!plan.has_plan());
    }

    #[test]
    fn test_task_update_status_and_subject() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "A"}), "Task #1");
        plan.handle_task_update(&json!({"taskId": "1", "status": "in_progress"}));
        plan.handle_task_update(&json!({"taskId": "1", "subject": "A, revised"}));

        let snapshot = plan.snapshot();
        assert_eq!(snapshot[0].content, "A, revised");
        assert_eq!(snapshot[0].status, PlanItemStatus::InProgress);
    }

    #[test]
    fn test_task_update_unknown_id_ignored() {
        let mut plan = PlanTracker::new();
        plan.handle_task_update(&json!({"taskId": "9", "status": "completed"}));
        assert!(!plan.has_plan());
    }

    #[test]
    fn test_task_update_deleted_removes_entry() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "A"}), "Task #1");
        plan.handle_task_create(&json!({"subject": "B"}), "Task #2");
        plan.handle_task_update(&json!({"taskId": "1", "status": "deleted"}));

        let snapshot = plan.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "B");
    }

    #[test]
    fn test_update_preserves_insertion_order() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "first"}), "Task #1");
        plan.handle_task_create(&json!({"subject": "second"}), "Task #2");
        plan.handle_task_update(&json!({"taskId": "1", "status": "completed"}));

        let snapshot = plan.snapshot();
        assert_eq!(snapshot[0].content, "first");
        assert_eq!(snapshot[1].content, "second");
    }

    #[test]
    fn test_todo_write_replaces_map() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "old"}), "Task #1");
        plan.handle_todo_write(&json!({"todos": [
            {"content": "one", "status": "completed"},
            {"content": "two", "status": "in_progress"},
            {"content": "three"}
        ]}));

        let snapshot = plan.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].status, PlanItemStatus::Completed);
        assert_eq!(snapshot[1].status, PlanItemStatus::InProgress);
        assert_eq!(snapshot[2].status, PlanItemStatus::Pending);
        assert_eq!(snapshot[2].content, "three");
    }

    #[test]
    fn test_todo_write_without_todos_clears() {
        let mut plan = PlanTracker::new();
        plan.handle_task_create(&json!({"subject": "old"}), "Task #1");
        plan.handle_todo_write(&json!({}));
        assert!(!plan.has_plan());
    }

    #[test]
    fn test_todo_write_idempotent() {
        let input = json!({"todos": [
            {"content": "one", "status": "completed"},
            {"content": "two", "status": "pending"}
        ]});

        let mut plan = PlanTracker::new();
        plan.handle_todo_write(&input);
        let first = plan.snapshot();
        plan.handle_todo_write(&input);
        let second = plan.snapshot();

        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_status_projects_to_pending() {
        let mut plan = PlanTracker::new();
        plan.handle_todo_write(&json!({"todos": [{"content": "x", "status": "wedged"}]}));
        assert_eq!(plan.snapshot()[0].status, PlanItemStatus::Pending);
    }
}
