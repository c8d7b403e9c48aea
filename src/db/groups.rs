//! Group formation and group queries.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    parse_datetime, parse_uuid, participant_from_row, require_participant, require_project,
    Database, PARTICIPANT_COLUMNS,
};
use crate::error::{CoreError, Result};
use crate::formation::{validate_group_size, GroupPlan};
use crate::models::*;
use crate::policy;

impl Database {
    /// Groups of a project in sequence order, each with its roster.
    pub fn list_groups(&self, project_id: Uuid) -> Result<Vec<GroupWithMembers>> {
        self.read(|conn| {
            require_project(conn, project_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM project_groups WHERE project_id = ? ORDER BY sequence",
                GROUP_COLUMNS
            ))?;
            let groups = stmt
                .query_map([project_id.to_string()], group_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            groups
                .into_iter()
                .map(|group| with_members(conn, group))
                .collect()
        })
    }

    pub fn get_group(&self, id: Uuid) -> Result<Option<GroupWithMembers>> {
        self.read(|conn| match find_group(conn, id)? {
            Some(group) => Ok(Some(with_members(conn, group)?)),
            None => Ok(None),
        })
    }

    /// Distribute a project's participants into balanced groups.
    ///
    /// With [`ApplyScope::WithoutGroup`] only unplaced participants are
    /// distributed and new groups are numbered after the existing ones. With
    /// [`ApplyScope::All`] every existing group of the project is deleted
    /// first, together with its join requests, sprints and work items.
    /// Participants are placed in enrollment order; the first one placed in
    /// each group leads it.
    pub fn partition_groups(
        &self,
        project_id: Uuid,
        input: PartitionGroupsInput,
    ) -> Result<PartitionResult> {
        self.write(|tx, now| {
            let project = require_project(tx, project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;

            let population: Vec<Uuid> = {
                let sql = match input.apply_type {
                    ApplyScope::All => {
                        "SELECT id FROM participants WHERE project_id = ? ORDER BY rowid"
                    }
                    ApplyScope::WithoutGroup => {
                        "SELECT id FROM participants WHERE project_id = ? AND group_id IS NULL ORDER BY rowid"
                    }
                };
                let mut stmt = tx.prepare(sql)?;
                let ids = stmt
                    .query_map([project_id.to_string()], |row| row.get::<_, String>(0))?
                    .map(|id| id.map(parse_uuid))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let plan = GroupPlan::new(population.len(), input.group_size)?;
            if plan.num_groups() == 0 {
                tracing::debug!("No participants to place in project {}", project_id);
                return Ok(PartitionResult {
                    num_of_groups: 0,
                    dissolved_groups: 0,
                    groups: Vec::new(),
                });
            }
            validate_group_size(input.group_size, population.len())?;

            let dissolved_groups = if input.apply_type == ApplyScope::All {
                dissolve_all(tx, project_id)?
            } else {
                0
            };

            let mut sequence = next_sequence(tx, project_id)?;
            let mut groups = Vec::with_capacity(plan.num_groups());
            for roster in plan.assign(&population)? {
                let group = insert_group(tx, project_id, sequence, now)?;
                for (i, participant_id) in roster.iter().enumerate() {
                    let role = if i == 0 {
                        GroupRole::Leader
                    } else {
                        GroupRole::Member
                    };
                    place(tx, *participant_id, group.id, role)?;
                    delete_requests_of(tx, *participant_id)?;
                }
                groups.push(with_members(tx, group)?);
                sequence += 1;
            }

            tracing::info!(
                "Partitioned {} participants of project {} into {} groups",
                plan.population(),
                project_id,
                groups.len()
            );

            Ok(PartitionResult {
                num_of_groups: groups.len(),
                dissolved_groups,
                groups,
            })
        })
    }

    /// Start a new group led by `actor`, who must not be in a group yet.
    pub fn create_own_group(&self, project_id: Uuid, actor: Uuid) -> Result<GroupWithMembers> {
        self.write(|tx, now| {
            let project = require_project(tx, project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_self_formation(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;

            let participant = require_participant(tx, actor)?;
            if participant.project_id != project_id {
                return Err(CoreError::Forbidden(format!(
                    "Participant {} is not enrolled in project {}",
                    actor, project_id
                )));
            }
            if let Some(group_id) = participant.group_id {
                return Err(CoreError::Conflict(format!(
                    "Participant {} already belongs to group {}",
                    actor, group_id
                )));
            }

            let sequence = next_sequence(tx, project_id)?;
            let group = insert_group(tx, project_id, sequence, now)?;
            place(tx, actor, group.id, GroupRole::Leader)?;
            delete_requests_of(tx, actor)?;

            tracing::info!(
                "Participant {} created group {} ({})",
                actor,
                group.sequence,
                group.id
            );
            with_members(tx, group)
        })
    }

    /// Let the group's leader switch automatic acceptance of join requests.
    pub fn set_auto_accept(&self, group_id: Uuid, auto_accept: bool, actor: Uuid) -> Result<Group> {
        self.write(|tx, now| {
            let group = require_group(tx, group_id)?;
            let project = require_project(tx, group.project_id)?;
            policy::ensure_team_project(&project)?;
            policy::ensure_can_modify_groups(&project, now)?;
            require_leader(tx, &group, actor)?;

            tx.execute(
                "UPDATE project_groups SET auto_accept = ? WHERE id = ?",
                (auto_accept, group_id.to_string()),
            )?;

            tracing::debug!("Group {} auto_accept set to {}", group_id, auto_accept);
            Ok(Group {
                auto_accept,
                ..group
            })
        })
    }

    /// Check the roster invariants of every group in a project.
    ///
    /// Every group is non-empty with exactly one leader, grouped participants
    /// always carry a role, ungrouped ones never do, and no placed participant
    /// still has a pending join request.
    pub fn verify_group_invariants(&self, project_id: Uuid) -> Result<()> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id,
                        (SELECT COUNT(*) FROM participants p WHERE p.group_id = g.id),
                        (SELECT COUNT(*) FROM participants p WHERE p.group_id = g.id AND p.role = 'leader'),
                        (SELECT COUNT(*) FROM participants p WHERE p.group_id = g.id AND p.project_id != g.project_id)
                 FROM project_groups g WHERE g.project_id = ?",
            )?;
            let counts = stmt
                .query_map([project_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for (group_id, members, leaders, foreign) in counts {
                if members == 0 {
                    return Err(CoreError::Internal(format!("group {} is empty", group_id)));
                }
                if leaders != 1 {
                    return Err(CoreError::Internal(format!(
                        "group {} has {} leaders",
                        group_id, leaders
                    )));
                }
                if foreign != 0 {
                    return Err(CoreError::Internal(format!(
                        "group {} has members from another project",
                        group_id
                    )));
                }
            }

            let inconsistent: i64 = conn.query_row(
                "SELECT COUNT(*) FROM participants
                 WHERE project_id = ? AND ((group_id IS NULL) != (role IS NULL))",
                [project_id.to_string()],
                |row| row.get(0),
            )?;
            if inconsistent != 0 {
                return Err(CoreError::Internal(format!(
                    "{} participants have a group without a role or a role without a group",
                    inconsistent
                )));
            }

            let stale: i64 = conn.query_row(
                "SELECT COUNT(*) FROM join_requests r
                 JOIN participants p ON p.id = r.participant_id
                 WHERE p.project_id = ? AND p.group_id IS NOT NULL",
                [project_id.to_string()],
                |row| row.get(0),
            )?;
            if stale != 0 {
                return Err(CoreError::Internal(format!(
                    "{} pending join requests belong to placed participants",
                    stale
                )));
            }

            Ok(())
        })
    }
}

// ============================================================
// Helpers shared with membership operations
// ============================================================

const GROUP_COLUMNS: &str = "id, project_id, sequence, auto_accept, created_at";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        sequence: row.get(2)?,
        auto_accept: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

pub(super) fn find_group(conn: &Connection, id: Uuid) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {} FROM project_groups WHERE id = ?", GROUP_COLUMNS),
            [id.to_string()],
            group_from_row,
        )
        .optional()?;
    Ok(group)
}

pub(super) fn require_group(conn: &Connection, id: Uuid) -> Result<Group> {
    find_group(conn, id)?.ok_or_else(|| CoreError::not_found("Group", id))
}

/// Roster of a group, leader first, then members in enrollment order.
pub(super) fn members_of(conn: &Connection, group_id: Uuid) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM participants WHERE group_id = ?
         ORDER BY CASE role WHEN 'leader' THEN 0 ELSE 1 END, rowid",
        PARTICIPANT_COLUMNS
    ))?;
    let members = stmt
        .query_map([group_id.to_string()], participant_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(members)
}

pub(super) fn with_members(conn: &Connection, group: Group) -> Result<GroupWithMembers> {
    let members = members_of(conn, group.id)?;
    Ok(GroupWithMembers { group, members })
}

/// Load `actor` and make sure it leads `group`.
pub(super) fn require_leader(conn: &Connection, group: &Group, actor: Uuid) -> Result<Participant> {
    let participant = require_participant(conn, actor)?;
    if !participant.is_leader_of(group.id) {
        return Err(CoreError::Forbidden(format!(
            "Participant {} is not the leader of group {}",
            actor, group.id
        )));
    }
    Ok(participant)
}

pub(super) fn place(
    conn: &Connection,
    participant_id: Uuid,
    group_id: Uuid,
    role: GroupRole,
) -> Result<()> {
    conn.execute(
        "UPDATE participants SET group_id = ?, role = ? WHERE id = ?",
        (
            group_id.to_string(),
            role.as_str(),
            participant_id.to_string(),
        ),
    )?;
    Ok(())
}

pub(super) fn unplace(conn: &Connection, participant_id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE participants SET group_id = NULL, role = NULL WHERE id = ?",
        [participant_id.to_string()],
    )?;
    Ok(())
}

pub(super) fn set_role(conn: &Connection, participant_id: Uuid, role: GroupRole) -> Result<()> {
    conn.execute(
        "UPDATE participants SET role = ? WHERE id = ?",
        (role.as_str(), participant_id.to_string()),
    )?;
    Ok(())
}

/// Delete every pending request of a participant, returning their ids.
pub(super) fn delete_requests_of(conn: &Connection, participant_id: Uuid) -> Result<Vec<Uuid>> {
    let ids = {
        let mut stmt =
            conn.prepare("SELECT id FROM join_requests WHERE participant_id = ? ORDER BY rowid")?;
        let ids = stmt
            .query_map([participant_id.to_string()], |row| row.get::<_, String>(0))?
            .map(|id| id.map(parse_uuid))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    conn.execute(
        "DELETE FROM join_requests WHERE participant_id = ?",
        [participant_id.to_string()],
    )?;
    Ok(ids)
}

/// Delete a group that has lost its last member.
pub(super) fn delete_group(conn: &Connection, group_id: Uuid) -> Result<()> {
    conn.execute(
        "DELETE FROM project_groups WHERE id = ?",
        [group_id.to_string()],
    )?;
    Ok(())
}

fn next_sequence(conn: &Connection, project_id: Uuid) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(sequence) FROM project_groups WHERE project_id = ?",
        [project_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

fn insert_group(
    conn: &Connection,
    project_id: Uuid,
    sequence: i64,
    now: DateTime<Utc>,
) -> Result<Group> {
    let group = Group {
        id: Uuid::new_v4(),
        project_id,
        sequence,
        auto_accept: false,
        created_at: now,
    };
    conn.execute(
        "INSERT INTO project_groups (id, project_id, sequence, auto_accept, created_at)
         VALUES (?, ?, ?, ?, ?)",
        (
            group.id.to_string(),
            project_id.to_string(),
            sequence,
            group.auto_accept,
            now.to_rfc3339(),
        ),
    )?;
    Ok(group)
}

/// Remove every group of a project. Join requests, sprints and work items
/// go with them through the foreign keys.
fn dissolve_all(conn: &Connection, project_id: Uuid) -> Result<usize> {
    conn.execute(
        "UPDATE participants SET group_id = NULL, role = NULL WHERE project_id = ?",
        [project_id.to_string()],
    )?;
    let dissolved = conn.execute(
        "DELETE FROM project_groups WHERE project_id = ?",
        [project_id.to_string()],
    )?;
    if dissolved > 0 {
        tracing::warn!(
            "Dissolved {} existing groups of project {} before repartitioning",
            dissolved,
            project_id
        );
    }
    Ok(dissolved)
}
