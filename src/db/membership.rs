//! Roster changes after formation: join requests, leadership, removal and
//! departure.
//!
//! Each operation loads the group and its project, checks the policy gates
//! against the transaction's `now`, then checks the actor's role. A gate
//! that is closed fails the whole operation before anything is written.

use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::groups::{
    delete_group, delete_requests_of, members_of, place, require_group, require_leader,
    set_role, unplace, with_members,
};
use super::sprints::release_assignments;
use super::{parse_datetime, parse_uuid, require_participant, require_project, Database};
use crate::error::{CoreError, Result};
use crate::models::*;
use crate::policy;

impl Database {
    /// Ask to join a group.
    ///
    /// Auto-accepting groups place the participant immediately; otherwise a
    /// pending request is queued for the leader.
    pub fn request_to_join(&self, group_id: Uuid, participant_id: Uuid) -> Result<JoinOutcome> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;

            let participant = require_participant(tx, participant_id)?;
            if participant.project_id != group.project_id {
                return Err(CoreError::InvalidParameter(format!(
                    "Participant {} is not enrolled in project {}",
                    participant_id, group.project_id
                )));
            }
            if let Some(current) = participant.group_id {
                return Err(CoreError::Conflict(format!(
                    "Participant {} already belongs to group {}",
                    participant_id, current
                )));
            }

            policy::ensure_self_formation(&project)?;
            policy::ensure_can_join(&project, now)?;

            if group.auto_accept {
                policy::ensure_can_modify_groups(&project, now)?;
                place(tx, participant_id, group_id, GroupRole::Member)?;
                let discarded = delete_requests_of(tx, participant_id)?;
                tracing::info!(
                    "Participant {} joined auto-accepting group {} ({} requests discarded)",
                    participant_id,
                    group_id,
                    discarded.len()
                );
                let participant = require_participant(tx, participant_id)?;
                return Ok(JoinOutcome::Joined { participant });
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM join_requests WHERE group_id = ? AND participant_id = ?",
                    (group_id.to_string(), participant_id.to_string()),
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CoreError::Conflict(format!(
                    "Participant {} already asked to join group {}",
                    participant_id, group_id
                )));
            }

            let request = JoinRequest {
                id: Uuid::new_v4(),
                group_id,
                participant_id,
                status: JoinRequestStatus::Pending,
                created_at: now,
            };
            tx.execute(
                "INSERT INTO join_requests (id, group_id, participant_id, created_at)
                 VALUES (?, ?, ?, ?)",
                (
                    request.id.to_string(),
                    group_id.to_string(),
                    participant_id.to_string(),
                    now.to_rfc3339(),
                ),
            )?;

            tracing::debug!(
                "Participant {} requested to join group {}",
                participant_id,
                group_id
            );
            Ok(JoinOutcome::Requested { request })
        })
    }

    /// Pending requests for a group, oldest first.
    pub fn list_join_requests(&self, group_id: Uuid) -> Result<Vec<JoinRequest>> {
        self.read(|conn| {
            require_group(conn, group_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM join_requests WHERE group_id = ? ORDER BY rowid",
                JOIN_REQUEST_COLUMNS
            ))?;
            let requests = stmt
                .query_map([group_id.to_string()], join_request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }

    /// Accept a pending request. Only the group's leader may do this.
    ///
    /// The requester becomes a member and every other request they still
    /// have open is discarded.
    pub fn accept_join_request(
        &self,
        group_id: Uuid,
        request_id: Uuid,
        actor: Uuid,
    ) -> Result<JoinRequestResolution> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;

            let request = find_join_request(tx, request_id)?
                .filter(|r| r.group_id == group_id)
                .ok_or_else(|| CoreError::not_found("Join request", request_id))?;

            policy::ensure_can_modify_groups(&project, now)?;
            require_leader(tx, &group, actor)?;

            let requester = require_participant(tx, request.participant_id)?;
            if let Some(current) = requester.group_id {
                return Err(CoreError::Conflict(format!(
                    "Participant {} was already placed in group {}",
                    requester.id, current
                )));
            }

            place(tx, requester.id, group_id, GroupRole::Member)?;
            let discarded_request_ids = delete_requests_of(tx, requester.id)?
                .into_iter()
                .filter(|id| *id != request_id)
                .collect();

            tracing::info!(
                "Leader {} accepted participant {} into group {}",
                actor,
                requester.id,
                group_id
            );

            Ok(JoinRequestResolution {
                request: JoinRequest {
                    status: JoinRequestStatus::Accepted,
                    ..request
                },
                participant: require_participant(tx, requester.id)?,
                discarded_request_ids,
            })
        })
    }

    /// Withdraw a pending request. Only the requester may do this, and no
    /// deadline applies.
    pub fn withdraw_join_request(&self, request_id: Uuid, actor: Uuid) -> Result<JoinRequest> {
        self.write(|tx, _| {
            let request = find_join_request(tx, request_id)?
                .ok_or_else(|| CoreError::not_found("Join request", request_id))?;
            if request.participant_id != actor {
                return Err(CoreError::Forbidden(format!(
                    "Only the requester can withdraw join request {}",
                    request_id
                )));
            }

            tx.execute(
                "DELETE FROM join_requests WHERE id = ?",
                [request_id.to_string()],
            )?;

            tracing::debug!("Join request {} withdrawn", request_id);
            Ok(JoinRequest {
                status: JoinRequestStatus::Withdrawn,
                ..request
            })
        })
    }

    /// Hand leadership to another member of the group.
    ///
    /// Both role changes commit together, so the group never has zero or two
    /// leaders outside the transaction.
    pub fn transfer_leadership(
        &self,
        group_id: Uuid,
        new_leader: Uuid,
        actor: Uuid,
    ) -> Result<GroupWithMembers> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;
            require_leader(tx, &group, actor)?;

            if new_leader == actor {
                return Err(CoreError::InvalidParameter(
                    "Leader cannot transfer leadership to themselves".to_string(),
                ));
            }
            let target = require_participant(tx, new_leader)?;
            if !target.is_member_of(group_id) {
                return Err(CoreError::InvalidParameter(format!(
                    "Participant {} is not a member of group {}",
                    new_leader, group_id
                )));
            }

            set_role(tx, actor, GroupRole::Member)?;
            set_role(tx, new_leader, GroupRole::Leader)?;

            tracing::info!(
                "Leadership of group {} passed from {} to {}",
                group_id,
                actor,
                new_leader
            );
            with_members(tx, group)
        })
    }

    /// Remove a member from the group. Only the leader may remove, and never
    /// themselves.
    pub fn remove_member(
        &self,
        group_id: Uuid,
        participant_id: Uuid,
        actor: Uuid,
    ) -> Result<GroupWithMembers> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;
            require_leader(tx, &group, actor)?;

            if participant_id == actor {
                return Err(CoreError::Forbidden(
                    "The leader cannot remove themselves".to_string(),
                ));
            }
            let target = require_participant(tx, participant_id)?;
            if !target.is_member_of(group_id) {
                return Err(CoreError::InvalidParameter(format!(
                    "Participant {} is not a member of group {}",
                    participant_id, group_id
                )));
            }
            if target.role == Some(GroupRole::Leader) {
                return Err(CoreError::Forbidden(format!(
                    "Participant {} leads group {} and cannot be removed",
                    participant_id, group_id
                )));
            }

            unplace(tx, participant_id)?;
            release_assignments(tx, participant_id, group_id, now)?;

            tracing::info!(
                "Leader {} removed participant {} from group {}",
                actor,
                participant_id,
                group_id
            );
            with_members(tx, group)
        })
    }

    /// Leave a group voluntarily.
    ///
    /// A leader may only leave as the last member, which deletes the group.
    /// Returns the participant as it is after leaving.
    pub fn leave_group(&self, group_id: Uuid, participant_id: Uuid) -> Result<Participant> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_can_leave(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;

            let participant = require_participant(tx, participant_id)?;
            if !participant.is_member_of(group_id) {
                return Err(CoreError::InvalidParameter(format!(
                    "Participant {} is not a member of group {}",
                    participant_id, group_id
                )));
            }

            let remaining = members_of(tx, group_id)?.len();
            if participant.role == Some(GroupRole::Leader) && remaining > 1 {
                return Err(CoreError::Forbidden(
                    "Transfer leadership before leaving the group".to_string(),
                ));
            }

            unplace(tx, participant_id)?;
            if remaining == 1 {
                delete_group(tx, group_id)?;
                tracing::info!(
                    "Participant {} left group {} as its last member; group deleted",
                    participant_id,
                    group_id
                );
            } else {
                release_assignments(tx, participant_id, group_id, now)?;
                tracing::info!("Participant {} left group {}", participant_id, group_id);
            }

            Ok(Participant {
                group_id: None,
                role: None,
                ..participant
            })
        })
    }
}

const JOIN_REQUEST_COLUMNS: &str = "id, group_id, participant_id, created_at";

fn join_request_from_row(row: &Row<'_>) -> rusqlite::Result<JoinRequest> {
    Ok(JoinRequest {
        id: parse_uuid(row.get::<_, String>(0)?),
        group_id: parse_uuid(row.get::<_, String>(1)?),
        participant_id: parse_uuid(row.get::<_, String>(2)?),
        status: JoinRequestStatus::Pending,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn find_join_request(conn: &Connection, id: Uuid) -> Result<Option<JoinRequest>> {
    let request = conn
        .query_row(
            &format!(
                "SELECT {} FROM join_requests WHERE id = ?",
                JOIN_REQUEST_COLUMNS
            ),
            [id.to_string()],
            join_request_from_row,
        )
        .optional()?;
    Ok(request)
}
