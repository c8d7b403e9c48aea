//! Sprint lifecycle and work items.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::groups::require_group;
use super::{parse_datetime, parse_uuid, require_participant, Database};
use crate::error::{CoreError, Result};
use crate::models::*;

impl Database {
    // ============================================================
    // Sprint operations
    // ============================================================

    pub fn create_sprint(&self, group_id: Uuid, input: CreateSprintInput) -> Result<Sprint> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::InvalidParameter(
                "Sprint name must not be empty".to_string(),
            ));
        }

        self.write(|tx, now| {
            require_group(tx, group_id)?;

            let sprint = Sprint {
                id: Uuid::new_v4(),
                group_id,
                name,
                status: SprintStatus::Planned,
                created_at: now,
                started_at: None,
                completed_at: None,
            };
            tx.execute(
                "INSERT INTO sprints (id, group_id, name, status, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    sprint.id.to_string(),
                    group_id.to_string(),
                    &sprint.name,
                    sprint.status.as_str(),
                    now.to_rfc3339(),
                ),
            )?;

            tracing::info!("Created sprint {} ({}) in group {}", sprint.name, sprint.id, group_id);
            Ok(sprint)
        })
    }

    pub fn get_sprint(&self, id: Uuid) -> Result<Option<Sprint>> {
        self.read(|conn| find_sprint(conn, id))
    }

    pub fn list_sprints(&self, group_id: Uuid) -> Result<Vec<Sprint>> {
        self.read(|conn| {
            require_group(conn, group_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sprints WHERE group_id = ? ORDER BY rowid",
                SPRINT_COLUMNS
            ))?;
            let sprints = stmt
                .query_map([group_id.to_string()], sprint_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sprints)
        })
    }

    /// Move a planned sprint to active. A group runs one sprint at a time.
    pub fn start_sprint(&self, id: Uuid) -> Result<Sprint> {
        self.write(|tx, now| {
            let sprint = require_sprint(tx, id)?;
            if sprint.status != SprintStatus::Planned {
                return Err(CoreError::Conflict(format!(
                    "Sprint {} is {} and cannot be started",
                    id,
                    sprint.status.as_str()
                )));
            }

            let running: Option<String> = tx
                .query_row(
                    "SELECT id FROM sprints WHERE group_id = ? AND status = 'active'",
                    [sprint.group_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(running) = running {
                return Err(CoreError::Conflict(format!(
                    "Group {} already has active sprint {}",
                    sprint.group_id, running
                )));
            }

            tx.execute(
                "UPDATE sprints SET status = 'active', started_at = ? WHERE id = ?",
                (now.to_rfc3339(), id.to_string()),
            )?;

            tracing::info!("Started sprint {}", id);
            Ok(Sprint {
                status: SprintStatus::Active,
                started_at: Some(now),
                ..sprint
            })
        })
    }

    /// Close an active sprint.
    ///
    /// Unfinished work items are collected once and re-parented in the same
    /// transaction that marks the sprint completed, so afterwards only done
    /// items point at it. Unfinished items require a disposition: the
    /// backlog or another open sprint of the same group.
    pub fn complete_sprint(
        &self,
        id: Uuid,
        input: CompleteSprintInput,
    ) -> Result<SprintCompletionResult> {
        self.write(|tx, now| {
            let sprint = require_sprint(tx, id)?;
            if sprint.status != SprintStatus::Active {
                return Err(CoreError::Conflict(format!(
                    "Sprint {} is {}; only an active sprint can be completed",
                    id,
                    sprint.status.as_str()
                )));
            }

            let destination = match (input.move_to_backlog, input.move_to_sprint_id) {
                (true, Some(_)) => {
                    return Err(CoreError::InvalidParameter(
                        "Choose either move_to_backlog or move_to_sprint_id, not both".to_string(),
                    ))
                }
                (true, None) => Some(WorkItemDestination::Backlog),
                (false, Some(target_id)) => {
                    validate_target_sprint(tx, &sprint, target_id)?;
                    Some(WorkItemDestination::Sprint {
                        sprint_id: target_id,
                    })
                }
                (false, None) => None,
            };

            let items = work_items_in_sprint(tx, id)?;
            let total = items.len();
            let unfinished: Vec<Uuid> = items
                .iter()
                .filter(|item| !item.status.is_done())
                .map(|item| item.id)
                .collect();
            let done_count = total - unfinished.len();

            if !unfinished.is_empty() {
                let target = match destination {
                    None => {
                        return Err(CoreError::InvalidParameter(format!(
                            "Sprint {} has {} unfinished work items; choose where they go",
                            id,
                            unfinished.len()
                        )))
                    }
                    Some(WorkItemDestination::Backlog) => None,
                    Some(WorkItemDestination::Sprint { sprint_id }) => Some(sprint_id.to_string()),
                };

                let mut stmt =
                    tx.prepare("UPDATE work_items SET sprint_id = ?, updated_at = ? WHERE id = ?")?;
                for item_id in &unfinished {
                    stmt.execute((&target, now.to_rfc3339(), item_id.to_string()))?;
                }
            }

            tx.execute(
                "UPDATE sprints SET status = 'completed', completed_at = ? WHERE id = ?",
                (now.to_rfc3339(), id.to_string()),
            )?;

            tracing::info!(
                "Completed sprint {}: {} done, {} moved",
                id,
                done_count,
                unfinished.len()
            );

            Ok(SprintCompletionResult {
                sprint: Sprint {
                    status: SprintStatus::Completed,
                    completed_at: Some(now),
                    ..sprint
                },
                done_count,
                moved_work_item_ids: unfinished,
                destination,
            })
        })
    }

    // ============================================================
    // Work item operations
    // ============================================================

    pub fn create_work_item(&self, group_id: Uuid, input: CreateWorkItemInput) -> Result<WorkItem> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::InvalidParameter(
                "Work item title must not be empty".to_string(),
            ));
        }

        self.write(|tx, now| {
            require_group(tx, group_id)?;
            if let Some(sprint_id) = input.sprint_id {
                require_open_sprint_in_group(tx, sprint_id, group_id)?;
            }
            if let Some(assignee_id) = input.assignee_id {
                require_group_member(tx, assignee_id, group_id)?;
            }

            let item = WorkItem {
                id: Uuid::new_v4(),
                group_id,
                sprint_id: input.sprint_id,
                title,
                status: input.status.unwrap_or_default(),
                assignee_id: input.assignee_id,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO work_items (id, group_id, sprint_id, title, status, assignee_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    item.id.to_string(),
                    group_id.to_string(),
                    item.sprint_id.map(|s| s.to_string()),
                    &item.title,
                    item.status.as_str(),
                    item.assignee_id.map(|a| a.to_string()),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;

            tracing::debug!("Created work item {} in group {}", item.id, group_id);
            Ok(item)
        })
    }

    pub fn get_work_item(&self, id: Uuid) -> Result<Option<WorkItem>> {
        self.read(|conn| find_work_item(conn, id))
    }

    /// Update a work item. Items kept by a completed sprint are frozen.
    pub fn update_work_item(&self, id: Uuid, input: UpdateWorkItemInput) -> Result<Option<WorkItem>> {
        self.write(|tx, now| {
            let Some(existing) = find_work_item(tx, id)? else {
                return Ok(None);
            };

            if let Some(current) = existing.sprint_id {
                if require_sprint(tx, current)?.status == SprintStatus::Completed {
                    return Err(CoreError::Conflict(format!(
                        "Work item {} belongs to completed sprint {}",
                        id, current
                    )));
                }
            }

            let title = match input.title {
                Some(title) if title.trim().is_empty() => {
                    return Err(CoreError::InvalidParameter(
                        "Work item title must not be empty".to_string(),
                    ))
                }
                Some(title) => title.trim().to_string(),
                None => existing.title.clone(),
            };
            let sprint_id = input.sprint_id.unwrap_or(existing.sprint_id);
            if let Some(sprint_id) = sprint_id {
                if Some(sprint_id) != existing.sprint_id {
                    require_open_sprint_in_group(tx, sprint_id, existing.group_id)?;
                }
            }
            let assignee_id = input.assignee_id.unwrap_or(existing.assignee_id);
            if let Some(assignee_id) = assignee_id {
                if Some(assignee_id) != existing.assignee_id {
                    require_group_member(tx, assignee_id, existing.group_id)?;
                }
            }

            let item = WorkItem {
                title,
                status: input.status.unwrap_or(existing.status),
                sprint_id,
                assignee_id,
                updated_at: now,
                ..existing
            };

            tx.execute(
                "UPDATE work_items SET title = ?, status = ?, sprint_id = ?, assignee_id = ?, updated_at = ?
                 WHERE id = ?",
                (
                    &item.title,
                    item.status.as_str(),
                    item.sprint_id.map(|s| s.to_string()),
                    item.assignee_id.map(|a| a.to_string()),
                    now.to_rfc3339(),
                    id.to_string(),
                ),
            )?;

            Ok(Some(item))
        })
    }

    pub fn list_sprint_work_items(&self, sprint_id: Uuid) -> Result<Vec<WorkItem>> {
        self.read(|conn| {
            require_sprint(conn, sprint_id)?;
            work_items_in_sprint(conn, sprint_id)
        })
    }

    /// Work items of a group that are not attached to any sprint.
    pub fn list_backlog(&self, group_id: Uuid) -> Result<Vec<WorkItem>> {
        self.read(|conn| {
            require_group(conn, group_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM work_items WHERE group_id = ? AND sprint_id IS NULL ORDER BY rowid",
                WORK_ITEM_COLUMNS
            ))?;
            let items = stmt
                .query_map([group_id.to_string()], work_item_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
    }
}

const SPRINT_COLUMNS: &str = "id, group_id, name, status, created_at, started_at, completed_at";

const WORK_ITEM_COLUMNS: &str =
    "id, group_id, sprint_id, title, status, assignee_id, created_at, updated_at";

fn sprint_from_row(row: &Row<'_>) -> rusqlite::Result<Sprint> {
    Ok(Sprint {
        id: parse_uuid(row.get::<_, String>(0)?),
        group_id: parse_uuid(row.get::<_, String>(1)?),
        name: row.get(2)?,
        status: SprintStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(SprintStatus::Planned),
        created_at: parse_datetime(row.get::<_, String>(4)?),
        started_at: row.get::<_, Option<String>>(5)?.map(parse_datetime),
        completed_at: row.get::<_, Option<String>>(6)?.map(parse_datetime),
    })
}

fn work_item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: parse_uuid(row.get::<_, String>(0)?),
        group_id: parse_uuid(row.get::<_, String>(1)?),
        sprint_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        title: row.get(3)?,
        status: WorkItemStatus::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        assignee_id: row.get::<_, Option<String>>(5)?.map(parse_uuid),
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn find_sprint(conn: &Connection, id: Uuid) -> Result<Option<Sprint>> {
    let sprint = conn
        .query_row(
            &format!("SELECT {} FROM sprints WHERE id = ?", SPRINT_COLUMNS),
            [id.to_string()],
            sprint_from_row,
        )
        .optional()?;
    Ok(sprint)
}

fn require_sprint(conn: &Connection, id: Uuid) -> Result<Sprint> {
    find_sprint(conn, id)?.ok_or_else(|| CoreError::not_found("Sprint", id))
}

fn find_work_item(conn: &Connection, id: Uuid) -> Result<Option<WorkItem>> {
    let item = conn
        .query_row(
            &format!("SELECT {} FROM work_items WHERE id = ?", WORK_ITEM_COLUMNS),
            [id.to_string()],
            work_item_from_row,
        )
        .optional()?;
    Ok(item)
}

fn work_items_in_sprint(conn: &Connection, sprint_id: Uuid) -> Result<Vec<WorkItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM work_items WHERE sprint_id = ? ORDER BY rowid",
        WORK_ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map([sprint_id.to_string()], work_item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// A completion target must be another open sprint of the same group.
fn validate_target_sprint(conn: &Connection, sprint: &Sprint, target_id: Uuid) -> Result<()> {
    if target_id == sprint.id {
        return Err(CoreError::InvalidParameter(
            "Cannot move unfinished work into the sprint being completed".to_string(),
        ));
    }
    let target = find_sprint(conn, target_id)?.ok_or_else(|| {
        CoreError::InvalidParameter(format!("Target sprint {} does not exist", target_id))
    })?;
    if target.group_id != sprint.group_id {
        return Err(CoreError::InvalidParameter(format!(
            "Target sprint {} belongs to another group",
            target_id
        )));
    }
    if target.status == SprintStatus::Completed {
        return Err(CoreError::InvalidParameter(format!(
            "Target sprint {} is already completed",
            target_id
        )));
    }
    Ok(())
}

fn require_open_sprint_in_group(conn: &Connection, sprint_id: Uuid, group_id: Uuid) -> Result<()> {
    let sprint = require_sprint(conn, sprint_id)?;
    if sprint.group_id != group_id {
        return Err(CoreError::InvalidParameter(format!(
            "Sprint {} belongs to another group",
            sprint_id
        )));
    }
    if sprint.status == SprintStatus::Completed {
        return Err(CoreError::InvalidParameter(format!(
            "Sprint {} is completed and accepts no work items",
            sprint_id
        )));
    }
    Ok(())
}

fn require_group_member(conn: &Connection, participant_id: Uuid, group_id: Uuid) -> Result<()> {
    let participant = require_participant(conn, participant_id)?;
    if !participant.is_member_of(group_id) {
        return Err(CoreError::InvalidParameter(format!(
            "Assignee {} is not a member of group {}",
            participant_id, group_id
        )));
    }
    Ok(())
}

/// Unassign a departing member from the group's open work items.
///
/// Items kept by completed sprints keep their assignee.
pub(super) fn release_assignments(
    conn: &Connection,
    participant_id: Uuid,
    group_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize> {
    let released = conn.execute(
        "UPDATE work_items SET assignee_id = NULL, updated_at = ?
         WHERE group_id = ? AND assignee_id = ?
           AND (sprint_id IS NULL
                OR sprint_id NOT IN (SELECT id FROM sprints WHERE status = 'completed'))",
        (
            now.to_rfc3339(),
            group_id.to_string(),
            participant_id.to_string(),
        ),
    )?;
    Ok(released)
}
