//! Record projector
//!
//! Dispatches journal records by type, pairs tool invocations with their
//! later results through the pending registry, drives the plan reducer as a
//! sideband, and serializes every tracker write through the token bucket.
//!
//! Write failures are logged and never abort the pipeline; cursor
//! advancement does not depend on write outcomes (at-most-once delivery).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::activity::{Activity, ActivityContent};
use crate::journal::{
    AssistantBlock, AssistantRecord, JournalRecord, QueueOperationRecord, SummaryRecord,
    UserBlock, UserContent, UserRecord, flatten_tool_result,
};
use crate::plan::PlanTracker;
use crate::rate_limit::TokenBucket;
use crate::toolmap::{self, ToolAction};
use crate::tracker::TrackerClient;

/// Write rate shared by activity posts and plan updates.
pub const TRACKER_WRITES_PER_SECOND: f64 = 2.0;
pub const TRACKER_WRITE_BURST: u32 = 5;

static PROMPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<prompt>(.*?)</prompt>").unwrap());
static SUMMARY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap());
static STATUS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<status>(.*?)</status>").unwrap());

/// Marker the agent embeds in a tool result that failed inside the tool.
const TOOL_USE_ERROR_MARKER: &str = "<tool_use_error>";

struct PendingToolUse {
    name: String,
    input: Value,
}

/// Projects journal records into tracker activities for one session.
pub struct Emitter<C: TrackerClient> {
    session_id: String,
    tracker: C,
    limiter: TokenBucket,
    pending: HashMap<String, PendingToolUse>,
    plan: PlanTracker,
    activities_posted: u64,
}

impl<C: TrackerClient> Emitter<C> {
    pub fn new(session_id: impl Into<String>, tracker: C) -> Self {
        Self {
            session_id: session_id.into(),
            tracker,
            limiter: TokenBucket::new(TRACKER_WRITES_PER_SECOND, TRACKER_WRITE_BURST),
            pending: HashMap::new(),
            plan: PlanTracker::new(),
            activities_posted: 0,
        }
    }

    /// Activities posted so far (attempted writes; failures count too).
    pub fn activities_posted(&self) -> u64 {
        self.activities_posted
    }

    /// Project one journal record. Unknown record types are skipped.
    pub async fn process(&mut self, record: &JournalRecord) {
        match record {
            JournalRecord::Assistant(rec) => self.process_assistant(rec).await,
            JournalRecord::User(rec) => self.process_user(rec).await,
            JournalRecord::Summary(rec) => self.process_summary(rec).await,
            JournalRecord::QueueOperation(rec) => self.process_queue_operation(rec).await,
            JournalRecord::Other => {}
        }
    }

    async fn process_assistant(&mut self, rec: &AssistantRecord) {
        if rec.is_api_error_message {
            let body = rec
                .message
                .content
                .iter()
                .filter_map(|block| match block {
                    AssistantBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ");
            if !body.is_empty() {
                self.post(ActivityContent::Error { body }, false).await;
            }
            return;
        }

        let Some(block) = rec.message.content.first() else {
            return;
        };

        match block {
            AssistantBlock::Thinking { thinking } => {
                self.post(
                    ActivityContent::Thought {
                        body: thinking.clone(),
                    },
                    true,
                )
                .await;
            }
            AssistantBlock::Text { text } => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    self.post(
                        ActivityContent::Response {
                            body: trimmed.to_string(),
                        },
                        false,
                    )
                    .await;
                }
            }
            AssistantBlock::ToolUse { id, name, input } => {
                self.pending.insert(
                    id.clone(),
                    PendingToolUse {
                        name: name.clone(),
                        input: input.clone(),
                    },
                );
                // Unknown tools are still registered so their result can be
                // recognized later, but project nothing themselves.
                if let Some(mapped) = toolmap::map_tool(name, input, None) {
                    self.post(action_content(mapped), true).await;
                }
            }
            AssistantBlock::Unknown => {}
        }
    }

    async fn process_user(&mut self, rec: &UserRecord) {
        if rec.source_tool_assistant_uuid.is_none() {
            // A real user prompt; only tagged external prompts are mirrored.
            if let UserContent::Text(text) = &rec.message.content {
                if let Some(captures) = PROMPT_TAG.captures(text) {
                    let captured = &captures[1];
                    if !captured.is_empty() {
                        self.post(
                            ActivityContent::Response {
                                body: format!("> **External prompt:** {captured}"),
                            },
                            false,
                        )
                        .await;
                    }
                }
            }
            return;
        }

        // Carrier record for one-or-more tool results
        if let UserContent::Blocks(blocks) = &rec.message.content {
            for block in blocks {
                if let UserBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } = block
                {
                    self.handle_tool_result(tool_use_id, content, *is_error).await;
                }
            }
        }
    }

    async fn process_summary(&mut self, rec: &SummaryRecord) {
        self.post(
            ActivityContent::Thought {
                body: format!("Context: {}", rec.summary),
            },
            false,
        )
        .await;
    }

    async fn process_queue_operation(&mut self, rec: &QueueOperationRecord) {
        if rec.operation != "enqueue" {
            return;
        }
        let Some(content) = &rec.content else {
            return;
        };
        let Some(summary) = SUMMARY_TAG.captures(content).map(|c| c[1].to_string()) else {
            return;
        };
        let status = STATUS_TAG.captures(content).map(|c| c[1].to_string());

        if status.as_deref() == Some("failed") {
            self.post(ActivityContent::Error { body: summary }, false).await;
        } else {
            self.post(
                ActivityContent::Action {
                    body: Some(summary),
                    action: None,
                    parameter: None,
                    result: None,
                },
                false,
            )
            .await;
        }
    }

    async fn handle_tool_result(&mut self, tool_use_id: &str, content: &Value, is_error: bool) {
        // A result with no registered invocation is dropped silently
        let Some(pending) = self.pending.remove(tool_use_id) else {
            return;
        };

        let text = flatten_tool_result(content);

        if text.contains(TOOL_USE_ERROR_MARKER) {
            let body = failure_body(&pending.name, &pending.input, None);
            self.post(ActivityContent::Error { body }, false).await;
            return;
        }
        if is_error {
            let body = failure_body(&pending.name, &pending.input, Some(&text));
            self.post(ActivityContent::Error { body }, false).await;
            return;
        }

        let drove_plan = match pending.name.as_str() {
            "TaskCreate" => {
                self.plan.handle_task_create(&pending.input, &text);
                true
            }
            "TaskUpdate" => {
                self.plan.handle_task_update(&pending.input);
                true
            }
            "TodoWrite" => {
                self.plan.handle_todo_write(&pending.input);
                true
            }
            _ => false,
        };
        if drove_plan && self.plan.has_plan() {
            self.push_plan().await;
        }

        if let Some(mapped) = toolmap::map_tool(&pending.name, &pending.input, Some(&text)) {
            self.post(action_content(mapped), false).await;
        }
    }

    async fn post(&mut self, content: ActivityContent, ephemeral: bool) {
        self.limiter.acquire().await;
        let activity = Activity {
            agent_session_id: self.session_id.clone(),
            content,
            ephemeral,
        };
        self.activities_posted += 1;
        if let Err(e) = self.tracker.create_activity(&activity).await {
            tracing::warn!(
                session_id = %self.session_id,
                error = %e,
                "Failed to post activity"
            );
        }
    }

    async fn push_plan(&mut self) {
        self.limiter.acquire().await;
        let snapshot = self.plan.snapshot();
        if let Err(e) = self
            .tracker
            .update_session_plan(&self.session_id, &snapshot)
            .await
        {
            tracing::warn!(
                session_id = %self.session_id,
                error = %e,
                "Failed to update session plan"
            );
        }
    }
}

fn action_content(mapped: ToolAction) -> ActivityContent {
    ActivityContent::Action {
        body: None,
        action: Some(mapped.action),
        parameter: Some(mapped.parameter),
        result: mapped.result,
    }
}

/// `**Name** `parameter` failed` with optional `:\n<detail>` appended.
fn failure_body(name: &str, input: &Value, detail: Option<&str>) -> String {
    let mut body = format!("**{name}**");
    if let Some(mapped) = toolmap::map_tool(name, input, None) {
        if !mapped.parameter.is_empty() {
            body.push_str(&format!(" `{}`", mapped.parameter));
        }
    }
    body.push_str(" failed");
    if let Some(detail) = detail {
        body.push_str(&format!(":\n{detail}"));
    }
    body
}
