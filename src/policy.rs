//! Participation rules: is a roster action allowed right now?
//!
//! Pure functions of the project configuration and the current time. The
//! `can_*` predicates answer the question; the `ensure_*` helpers turn a
//! closed gate into a [`CoreError::PolicyViolation`] for callers that are
//! about to mutate state.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::models::{ParticipationMode, Project, ProjectType};

/// Join requests are open until the join deadline (exclusive).
pub fn can_join_group(project: &Project, now: DateTime<Utc>) -> bool {
    project.join_deadline.map_or(true, |deadline| now < deadline)
}

/// Rosters can change until the group-formation deadline (exclusive).
pub fn can_form_or_modify_groups(project: &Project, now: DateTime<Utc>) -> bool {
    project
        .form_group_deadline
        .map_or(true, |deadline| now < deadline)
}

/// Participants of a mandatory project can never leave on their own.
pub fn can_leave(project: &Project) -> bool {
    project.participation_mode == ParticipationMode::Optional
}

pub fn ensure_team_project(project: &Project) -> Result<()> {
    if project.project_type != ProjectType::Team {
        return Err(CoreError::PolicyViolation(format!(
            "Project {} is a solo project and has no groups",
            project.id
        )));
    }
    Ok(())
}

pub fn ensure_can_join(project: &Project, now: DateTime<Utc>) -> Result<()> {
    if !can_join_group(project, now) {
        return Err(CoreError::PolicyViolation(
            "The join deadline has passed".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_can_modify_groups(project: &Project, now: DateTime<Utc>) -> Result<()> {
    if !can_form_or_modify_groups(project, now) {
        return Err(CoreError::PolicyViolation(
            "The group formation deadline has passed".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_can_leave(project: &Project) -> Result<()> {
    if !can_leave(project) {
        return Err(CoreError::PolicyViolation(
            "Participation in this project is mandatory".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_self_formation(project: &Project) -> Result<()> {
    if !project.allow_self_formation {
        return Err(CoreError::PolicyViolation(
            "This project does not allow students to form groups themselves".to_string(),
        ));
    }
    Ok(())
}
