//! Outbound wire types for the tracker API
//!
//! An [`Activity`] describes one projected unit of agent behavior. The
//! tracker visually collapses an ephemeral activity when a later final
//! activity arrives; no correlation id is sent.

use serde::{Deserialize, Serialize};

/// One activity posted to the tracker for an agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Session the activity belongs to (UUID shared with the tracker)
    #[serde(rename = "agentSessionId")]
    pub agent_session_id: String,

    /// Typed activity payload
    pub content: ActivityContent,

    /// Transient marker: the tracker replaces this activity when a final
    /// one with the same logical identity arrives
    #[serde(default, skip_serializing_if = "is_false")]
    pub ephemeral: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Tagged activity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActivityContent {
    Thought {
        body: String,
    },
    Response {
        body: String,
    },
    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameter: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    Error {
        body: String,
    },
    Prompt {
        body: String,
    },
    Elicitation {
        body: String,
    },
}

/// One item of the mirrored plan, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub content: String,
    pub status: PlanItemStatus,
}

/// Task status as the tracker models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanItemStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
}
