use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded work cycle owned by a group.
///
/// Sprints move `Planned` → `Active` → `Completed`. A group has at most one
/// active sprint, and a completed sprint is immutable: nothing may point at
/// it as a destination and no work item is left attached to it unfinished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub status: SprintStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The status of a sprint.
///
/// - `Planned`: Created, accepts work items, not yet running
/// - `Active`: The group's running sprint
/// - `Completed`: Closed; terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Input for creating a new sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSprintInput {
    pub name: String,
}

/// Input for completing a sprint.
///
/// Decides where unfinished work goes. Leave both fields unset only when
/// every work item in the sprint is done.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteSprintInput {
    /// Detach unfinished work items from any sprint.
    #[serde(default)]
    pub move_to_backlog: bool,
    /// Re-parent unfinished work items to this sprint of the same group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_to_sprint_id: Option<Uuid>,
}

impl CompleteSprintInput {
    pub fn to_backlog() -> Self {
        Self {
            move_to_backlog: true,
            move_to_sprint_id: None,
        }
    }

    pub fn to_sprint(sprint_id: Uuid) -> Self {
        Self {
            move_to_backlog: false,
            move_to_sprint_id: Some(sprint_id),
        }
    }
}

/// Where unfinished work went when a sprint was completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItemDestination {
    Backlog,
    Sprint { sprint_id: Uuid },
}

/// Result of completing a sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintCompletionResult {
    pub sprint: Sprint,
    /// Number of work items that were already done and stay with the sprint.
    pub done_count: usize,
    pub moved_work_item_ids: Vec<Uuid>,
    /// `None` when nothing needed to move and no disposition was given.
    pub destination: Option<WorkItemDestination>,
}
