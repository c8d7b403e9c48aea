use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::participant::Participant;

/// A collaborative group inside a TEAM project.
///
/// A group that survives a completed operation always has exactly one leader.
/// Groups that become empty are deleted, so an empty roster is never observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Sequence number, unique within the project (`Group 1`, `Group 2`, ...).
    pub sequence: i64,
    /// When set, join requests are accepted immediately without the leader.
    pub auto_accept: bool,
    pub created_at: DateTime<Utc>,
}

/// A group with its roster, leader first and then members in enrollment order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWithMembers {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<Participant>,
}

impl GroupWithMembers {
    pub fn leader(&self) -> Option<&Participant> {
        self.members.iter().find(|p| p.is_leader_of(self.group.id))
    }
}

/// A request by an unplaced participant to enter a group.
///
/// Only pending requests are stored; resolving a request (accepting or
/// withdrawing it) deletes the row and reports the final status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinRequest {
    pub id: Uuid,
    pub group_id: Uuid,
    pub participant_id: Uuid,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Accepted,
    Withdrawn,
}

/// Result of asking to join a group.
///
/// Auto-accepting groups place the participant right away; all other groups
/// queue a pending [`JoinRequest`] for the leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    Requested { request: JoinRequest },
    Joined { participant: Participant },
}

/// Result of accepting a join request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequestResolution {
    /// The accepted request (already deleted from storage).
    pub request: JoinRequest,
    /// The requester after being placed in the group.
    pub participant: Participant,
    /// Other pending requests from the same participant that were discarded.
    pub discarded_request_ids: Vec<Uuid>,
}

/// Which participants a partition run distributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyScope {
    /// Only participants without a group; existing groups are kept.
    WithoutGroup,
    /// Everyone in the project; every existing group is dissolved first.
    All,
}

/// Input for partitioning a project's participants into groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionGroupsInput {
    /// Maximum number of participants per group.
    pub group_size: i64,
    pub apply_type: ApplyScope,
}

/// Result of a partition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResult {
    pub num_of_groups: usize,
    /// Number of pre-existing groups deleted (only non-zero for `ApplyScope::All`).
    pub dissolved_groups: usize,
    pub groups: Vec<GroupWithMembers>,
}

/// Input for handing leadership to another member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLeadershipInput {
    pub participant_id: Uuid,
}

/// Input for toggling a group's auto-accept flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAutoAcceptInput {
    pub auto_accept: bool,
}
