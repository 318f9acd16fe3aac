//! Tool-invocation mapping table
//!
//! Pure functions mapping `(tool name, input, optional result)` to the
//! action/parameter/result triple shown on the tracker. Unknown tool names
//! have no mapping; the projector emits nothing for them.

use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

static GIT_DIFF_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git\s+diff\b").unwrap());
static AGENT_ID_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"agentId:.*\n?").unwrap());
static USAGE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<usage>.*?</usage>").unwrap());

/// The projected description of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAction {
    pub action: String,
    pub parameter: String,
    pub result: Option<String>,
}

/// Map a tool invocation to its tracker presentation.
///
/// `result` is `None` for the ephemeral projection emitted at `tool_use`
/// time, and the flattened result text once the `tool_result` arrives.
/// Returns `None` for tools outside the table.
pub fn map_tool(name: &str, input: &Value, result: Option<&str>) -> Option<ToolAction> {
    let mapped = match name {
        "Bash" => {
            let command = str_field(input, "command");
            let result = result.map(|r| format_bash_result(&command, r));
            ToolAction {
                action: "Ran command".to_string(),
                parameter: command,
                result,
            }
        }
        "Edit" => ToolAction {
            action: "Edited file".to_string(),
            parameter: str_field(input, "file_path"),
            result: result.and_then(|_| format_edit_result(input)),
        },
        "Write" => ToolAction {
            action: "Created file".to_string(),
            parameter: str_field(input, "file_path"),
            result: None,
        },
        "Read" => ToolAction {
            action: "Read file".to_string(),
            parameter: str_field(input, "file_path"),
            result: None,
        },
        "Glob" => {
            let mut parameter = str_field(input, "pattern");
            let path = str_field(input, "path");
            if !path.is_empty() {
                parameter.push_str(&format!(" in {path}"));
            }
            ToolAction {
                action: "Searched files".to_string(),
                parameter,
                result: result.map(ToString::to_string),
            }
        }
        "Grep" => {
            let mut parameter = str_field(input, "pattern");
            let path = str_field(input, "path");
            if !path.is_empty() {
                parameter.push_str(&format!(" in {path}"));
            }
            let glob = str_field(input, "glob");
            if !glob.is_empty() {
                parameter.push_str(&format!(" ({glob})"));
            }
            ToolAction {
                action: "Searched for pattern".to_string(),
                parameter,
                result: result.map(ToString::to_string),
            }
        }
        "Task" => ToolAction {
            action: "Delegated subtask".to_string(),
            parameter: str_field(input, "description"),
            result: result.and_then(format_task_result),
        },
        "WebFetch" => ToolAction {
            action: "Fetched URL".to_string(),
            parameter: str_field(input, "url"),
            result: result.map(ToString::to_string),
        },
        "WebSearch" => ToolAction {
            action: "Web search".to_string(),
            parameter: str_field(input, "query"),
            result: None,
        },
        "TaskCreate" => ToolAction {
            action: "Created task".to_string(),
            parameter: str_field(input, "subject"),
            result: None,
        },
        "TaskUpdate" => ToolAction {
            action: "Updated task".to_string(),
            parameter: str_field(input, "taskId"),
            result: None,
        },
        "Skill" => ToolAction {
            action: "Invoked skill".to_string(),
            parameter: str_field(input, "skill"),
            result: None,
        },
        "AskUserQuestion" => ToolAction {
            action: "Asked user".to_string(),
            parameter: first_question(input),
            result: None,
        },
        "NotebookEdit" => ToolAction {
            action: "Edited notebook".to_string(),
            parameter: str_field(input, "notebook_path"),
            result: None,
        },
        _ => return None,
    };
    Some(mapped)
}

/// A string field of a free-form input object; missing or null coerces to "".
fn str_field(input: &Value, key: &str) -> String {
    input
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn first_question(input: &Value) -> String {
    input
        .get("questions")
        .and_then(|q| q.get(0))
        .and_then(|q| q.get("question"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn format_bash_result(command: &str, result: &str) -> String {
    if GIT_DIFF_COMMAND.is_match(command) {
        format!("```diff\n{result}\n```")
    } else if serde_json::from_str::<Value>(result).is_ok() {
        format!("```json\n{result}\n```")
    } else {
        result.to_string()
    }
}

fn format_edit_result(input: &Value) -> Option<String> {
    let old = str_field(input, "old_string");
    let new = str_field(input, "new_string");
    if old.is_empty() && new.is_empty() {
        return None;
    }
    Some(format!("```diff\n- {old}\n+ {new}\n```"))
}

/// Subagent output minus the bookkeeping lines the agent embeds in it.
fn format_task_result(result: &str) -> Option<String> {
    let stripped = AGENT_ID_LINE.replace_all(result, "");
    let stripped = USAGE_BLOCK.replace_all(&stripped, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
