use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person's enrollment in one project.
///
/// There is at most one participant per person per project. Group membership
/// is expressed here (`group_id` + `role`) rather than on the group, so a
/// participant can belong to at most one group at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Identity reference supplied by the account system (opaque to cohort).
    pub user_ref: String,
    pub group_id: Option<Uuid>,
    /// Set exactly when `group_id` is set.
    pub role: Option<GroupRole>,
    pub enrolled_at: DateTime<Utc>,
}

impl Participant {
    pub fn is_leader_of(&self, group_id: Uuid) -> bool {
        self.group_id == Some(group_id) && self.role == Some(GroupRole::Leader)
    }

    pub fn is_member_of(&self, group_id: Uuid) -> bool {
        self.group_id == Some(group_id)
    }
}

/// A participant's role inside its group.
///
/// - `Leader`: the single participant allowed to accept requests, remove
///   members and hand over leadership
/// - `Member`: everyone else
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Leader,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "leader" => Some(Self::Leader),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Input for enrolling a person in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollParticipantInput {
    pub user_ref: String,
}
