use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work in a group's backlog.
///
/// `sprint_id = None` means the item sits in the backlog. The sprint
/// lifecycle never creates or deletes work items; it only re-parents them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sprint_id: Option<Uuid>,
    pub title: String,
    pub status: WorkItemStatus,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The progress of a work item. `Done` is the only terminal value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Input for creating a work item in a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorkItemInput {
    pub title: String,
    #[serde(default)]
    pub status: Option<WorkItemStatus>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    /// Sprint of the same group; the backlog when absent.
    #[serde(default)]
    pub sprint_id: Option<Uuid>,
}

/// Input for updating a work item. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkItemInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkItemStatus>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<Uuid>>,
    /// `null` moves the item to the backlog.
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sprint_id: Option<Option<Uuid>>,
}
