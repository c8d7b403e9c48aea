mod groups;
mod membership;
mod schema;
mod sprints;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::models::*;

/// SQLite-backed store for projects, rosters and sprints.
///
/// Every mutation runs inside one `IMMEDIATE` transaction while holding the
/// connection lock, so a mutation either commits completely or leaves no
/// trace, and concurrent callers observe a linear history.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for deadline checks and timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Internal("database lock poisoned".to_string()))
    }

    /// Run `f` against a consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` in an immediate transaction, committing only if it succeeds.
    ///
    /// `now` is read after the write lock is taken, so deadline checks and the
    /// writes they guard see the same instant.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.clock.now();
        let value = f(&tx, now)?;
        tx.commit()?;
        Ok(value)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub fn get_all_projects(&self) -> Result<Vec<Project>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM projects ORDER BY name",
                PROJECT_COLUMNS
            ))?;
            let projects = stmt
                .query_map([], project_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        self.read(|conn| find_project(conn, id))
    }

    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        if input.name.trim().is_empty() {
            return Err(CoreError::InvalidParameter(
                "Project name must not be empty".to_string(),
            ));
        }

        self.write(|tx, now| {
            let project = Project {
                id: Uuid::new_v4(),
                name: input.name,
                project_type: input.project_type,
                participation_mode: input.participation_mode,
                allow_self_formation: input.allow_self_formation,
                join_deadline: input.join_deadline,
                form_group_deadline: input.form_group_deadline,
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                "INSERT INTO projects (id, name, project_type, participation_mode, allow_self_formation,
                                       join_deadline, form_group_deadline, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    project.id.to_string(),
                    &project.name,
                    project.project_type.as_str(),
                    project.participation_mode.as_str(),
                    project.allow_self_formation,
                    project.join_deadline.map(|d| d.to_rfc3339()),
                    project.form_group_deadline.map(|d| d.to_rfc3339()),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;

            tracing::info!("Created project {} ({})", project.name, project.id);
            Ok(project)
        })
    }

    pub fn update_project(&self, id: Uuid, input: UpdateProjectInput) -> Result<Option<Project>> {
        self.write(|tx, now| {
            let Some(existing) = find_project(tx, id)? else {
                return Ok(None);
            };

            let project = Project {
                name: input.name.unwrap_or(existing.name),
                participation_mode: input
                    .participation_mode
                    .unwrap_or(existing.participation_mode),
                allow_self_formation: input
                    .allow_self_formation
                    .unwrap_or(existing.allow_self_formation),
                join_deadline: input.join_deadline.unwrap_or(existing.join_deadline),
                form_group_deadline: input
                    .form_group_deadline
                    .unwrap_or(existing.form_group_deadline),
                updated_at: now,
                ..existing
            };

            tx.execute(
                "UPDATE projects SET name = ?, participation_mode = ?, allow_self_formation = ?,
                                     join_deadline = ?, form_group_deadline = ?, updated_at = ?
                 WHERE id = ?",
                (
                    &project.name,
                    project.participation_mode.as_str(),
                    project.allow_self_formation,
                    project.join_deadline.map(|d| d.to_rfc3339()),
                    project.form_group_deadline.map(|d| d.to_rfc3339()),
                    now.to_rfc3339(),
                    id.to_string(),
                ),
            )?;

            Ok(Some(project))
        })
    }

    /// Delete a project with everything it owns.
    pub fn delete_project(&self, id: Uuid) -> Result<bool> {
        self.write(|tx, _| {
            let rows = tx.execute("DELETE FROM projects WHERE id = ?", [id.to_string()])?;
            if rows > 0 {
                tracing::info!("Deleted project {}", id);
            }
            Ok(rows > 0)
        })
    }

    // ============================================================
    // Participant operations
    // ============================================================

    pub fn enroll_participant(
        &self,
        project_id: Uuid,
        input: EnrollParticipantInput,
    ) -> Result<Participant> {
        let user_ref = input.user_ref.trim().to_string();
        if user_ref.is_empty() {
            return Err(CoreError::InvalidParameter(
                "user_ref must not be empty".to_string(),
            ));
        }

        self.write(|tx, now| {
            require_project(tx, project_id)?;

            let duplicate: Option<String> = tx
                .query_row(
                    "SELECT id FROM participants WHERE project_id = ? AND user_ref = ?",
                    (project_id.to_string(), &user_ref),
                    |row| row.get(0),
                )
                .optional()?;
            if duplicate.is_some() {
                return Err(CoreError::Conflict(format!(
                    "{} is already enrolled in project {}",
                    user_ref, project_id
                )));
            }

            let participant = Participant {
                id: Uuid::new_v4(),
                project_id,
                user_ref,
                group_id: None,
                role: None,
                enrolled_at: now,
            };

            tx.execute(
                "INSERT INTO participants (id, project_id, user_ref, group_id, role, enrolled_at)
                 VALUES (?, ?, ?, NULL, NULL, ?)",
                (
                    participant.id.to_string(),
                    participant.project_id.to_string(),
                    &participant.user_ref,
                    now.to_rfc3339(),
                ),
            )?;

            Ok(participant)
        })
    }

    pub fn get_participant(&self, id: Uuid) -> Result<Option<Participant>> {
        self.read(|conn| find_participant(conn, id))
    }

    /// All participants of a project in enrollment order.
    pub fn get_participants_by_project(&self, project_id: Uuid) -> Result<Vec<Participant>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM participants WHERE project_id = ? ORDER BY rowid",
                PARTICIPANT_COLUMNS
            ))?;
            let participants = stmt
                .query_map([project_id.to_string()], participant_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(participants)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            clock: self.clock.clone(),
        }
    }
}

fn default_path() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "cohort")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("cohort.db"))
}

// ============================================================
// Row helpers shared by the operation modules
// ============================================================

const PROJECT_COLUMNS: &str = "id, name, project_type, participation_mode, allow_self_formation, \
     join_deadline, form_group_deadline, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "id, project_id, user_ref, group_id, role, enrolled_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        project_type: ProjectType::from_str(&row.get::<_, String>(2)?)
            .unwrap_or(ProjectType::Team),
        participation_mode: ParticipationMode::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(ParticipationMode::Mandatory),
        allow_self_formation: row.get(4)?,
        join_deadline: row.get::<_, Option<String>>(5)?.map(parse_datetime),
        form_group_deadline: row.get::<_, Option<String>>(6)?.map(parse_datetime),
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        user_ref: row.get(2)?,
        group_id: row.get::<_, Option<String>>(3)?.map(parse_uuid),
        role: row
            .get::<_, Option<String>>(4)?
            .and_then(|r| GroupRole::from_str(&r)),
        enrolled_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn find_project(conn: &Connection, id: Uuid) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS),
            [id.to_string()],
            project_from_row,
        )
        .optional()?;
    Ok(project)
}

fn require_project(conn: &Connection, id: Uuid) -> Result<Project> {
    find_project(conn, id)?.ok_or_else(|| CoreError::not_found("Project", id))
}

fn find_participant(conn: &Connection, id: Uuid) -> Result<Option<Participant>> {
    let participant = conn
        .query_row(
            &format!(
                "SELECT {} FROM participants WHERE id = ?",
                PARTICIPANT_COLUMNS
            ),
            [id.to_string()],
            participant_from_row,
        )
        .optional()?;
    Ok(participant)
}

fn require_participant(conn: &Connection, id: Uuid) -> Result<Participant> {
    find_participant(conn, id)?.ok_or_else(|| CoreError::not_found("Participant", id))
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
