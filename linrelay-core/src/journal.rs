//! Journal record types
//!
//! A journal file is a UTF-8 append-only stream of newline-delimited JSON
//! objects written by the agent, discriminated by a `type` field. Records
//! and content blocks deserialize into tagged enums; unknown tags fall
//! through to catch-all variants and are ignored downstream.
//!
//! Uses `#[serde(default)]` liberally so partially-populated records still
//! deserialize instead of being dropped.

use serde::Deserialize;

/// One line of the journal.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum JournalRecord {
    #[serde(rename = "assistant")]
    Assistant(AssistantRecord),
    #[serde(rename = "user")]
    User(UserRecord),
    #[serde(rename = "summary")]
    Summary(SummaryRecord),
    #[serde(rename = "queue-operation")]
    QueueOperation(QueueOperationRecord),
    /// progress, file-history-snapshot, system, and anything newer
    #[serde(other)]
    Other,
}

/// One assistant message.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantRecord {
    pub uuid: Option<String>,
    pub session_id: Option<String>,
    pub message: AssistantMessage,
    /// Redirects dispatch: the message carries an upstream API error
    pub is_api_error_message: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssistantMessage {
    pub content: Vec<AssistantBlock>,
}

/// Content block inside an assistant message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantBlock {
    Thinking {
        thinking: String,
    },
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

/// Either a real user prompt (no `sourceToolAssistantUUID`) or a synthetic
/// carrier for one-or-more `tool_result` blocks.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRecord {
    pub uuid: Option<String>,
    pub session_id: Option<String>,
    pub message: UserMessage,
    #[serde(rename = "sourceToolAssistantUUID")]
    pub source_tool_assistant_uuid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserMessage {
    pub content: UserContent,
}

/// User message content arrives either as a bare string or as blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<UserBlock>),
}

impl Default for UserContent {
    fn default() -> Self {
        UserContent::Text(String::new())
    }
}

/// Content block inside a user message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserBlock {
    Text {
        text: String,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

/// A condensed context summary.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryRecord {
    pub summary: String,
}

/// Background-job lifecycle notification.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueueOperationRecord {
    pub operation: String,
    pub content: Option<String>,
}

/// Flatten a `tool_result` content value to plain text.
///
/// A string is used as-is; an array of `{type, text}` elements joins the
/// text fields with newlines. Anything else flattens to empty.
pub fn flatten_tool_result(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(serde_json::Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
