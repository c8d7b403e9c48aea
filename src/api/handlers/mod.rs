use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::middleware::Actor;
use crate::db::Database;
use crate::error::{CoreError, Result};
use crate::models::*;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Projects
// ============================================================

pub async fn list_projects(State(db): State<Database>) -> Result<Json<Vec<Project>>> {
    db.get_all_projects().map(Json)
}

pub async fn get_project(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>> {
    db.get_project(id)?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("Project", id))
}

pub async fn create_project(
    State(db): State<Database>,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>)> {
    db.create_project(input)
        .map(|p| (StatusCode::CREATED, Json(p)))
}

pub async fn update_project(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Json<Project>> {
    db.update_project(id, input)?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("Project", id))
}

pub async fn delete_project(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if db.delete_project(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("Project", id))
    }
}

// ============================================================
// Participants
// ============================================================

pub async fn list_participants(
    State(db): State<Database>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>> {
    db.get_project(project_id)?
        .ok_or_else(|| CoreError::not_found("Project", project_id))?;
    db.get_participants_by_project(project_id).map(Json)
}

pub async fn enroll_participant(
    State(db): State<Database>,
    Path(project_id): Path<Uuid>,
    Json(input): Json<EnrollParticipantInput>,
) -> Result<(StatusCode, Json<Participant>)> {
    db.enroll_participant(project_id, input)
        .map(|p| (StatusCode::CREATED, Json(p)))
}

// ============================================================
// Groups
// ============================================================

pub async fn list_groups(
    State(db): State<Database>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<GroupWithMembers>>> {
    db.list_groups(project_id).map(Json)
}

pub async fn create_own_group(
    State(db): State<Database>,
    Path(project_id): Path<Uuid>,
    Actor(actor): Actor,
) -> Result<(StatusCode, Json<GroupWithMembers>)> {
    db.create_own_group(project_id, actor)
        .map(|g| (StatusCode::CREATED, Json(g)))
}

pub async fn partition_groups(
    State(db): State<Database>,
    Path(project_id): Path<Uuid>,
    Json(input): Json<PartitionGroupsInput>,
) -> Result<Json<PartitionResult>> {
    db.partition_groups(project_id, input).map(Json)
}

pub async fn get_group(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<GroupWithMembers>> {
    db.get_group(id)?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("Group", id))
}

pub async fn set_auto_accept(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(input): Json<SetAutoAcceptInput>,
) -> Result<Json<Group>> {
    db.set_auto_accept(id, input.auto_accept, actor).map(Json)
}

// ============================================================
// Membership
// ============================================================

pub async fn list_join_requests(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<JoinRequest>>> {
    db.list_join_requests(group_id).map(Json)
}

/// The acting participant asks to join the group.
pub async fn create_join_request(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
    Actor(actor): Actor,
) -> Result<(StatusCode, Json<JoinOutcome>)> {
    db.request_to_join(group_id, actor)
        .map(|outcome| (StatusCode::CREATED, Json(outcome)))
}

pub async fn accept_join_request(
    State(db): State<Database>,
    Path((group_id, request_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
) -> Result<Json<JoinRequestResolution>> {
    db.accept_join_request(group_id, request_id, actor).map(Json)
}

pub async fn withdraw_join_request(
    State(db): State<Database>,
    Path(request_id): Path<Uuid>,
    Actor(actor): Actor,
) -> Result<Json<JoinRequest>> {
    db.withdraw_join_request(request_id, actor).map(Json)
}

pub async fn transfer_leadership(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
    Actor(actor): Actor,
    Json(input): Json<TransferLeadershipInput>,
) -> Result<Json<GroupWithMembers>> {
    db.transfer_leadership(group_id, input.participant_id, actor)
        .map(Json)
}

pub async fn remove_member(
    State(db): State<Database>,
    Path((group_id, participant_id)): Path<(Uuid, Uuid)>,
    Actor(actor): Actor,
) -> Result<Json<GroupWithMembers>> {
    db.remove_member(group_id, participant_id, actor).map(Json)
}

pub async fn leave_group(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
    Actor(actor): Actor,
) -> Result<Json<Participant>> {
    db.leave_group(group_id, actor).map(Json)
}

// ============================================================
// Sprints
// ============================================================

pub async fn list_sprints(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<Sprint>>> {
    db.list_sprints(group_id).map(Json)
}

pub async fn create_sprint(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
    Json(input): Json<CreateSprintInput>,
) -> Result<(StatusCode, Json<Sprint>)> {
    db.create_sprint(group_id, input)
        .map(|s| (StatusCode::CREATED, Json(s)))
}

pub async fn get_sprint(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sprint>> {
    db.get_sprint(id)?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("Sprint", id))
}

pub async fn start_sprint(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sprint>> {
    db.start_sprint(id).map(Json)
}

pub async fn complete_sprint(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<CompleteSprintInput>,
) -> Result<Json<SprintCompletionResult>> {
    db.complete_sprint(id, input).map(Json)
}

// ============================================================
// Work items
// ============================================================

pub async fn list_sprint_work_items(
    State(db): State<Database>,
    Path(sprint_id): Path<Uuid>,
) -> Result<Json<Vec<WorkItem>>> {
    db.list_sprint_work_items(sprint_id).map(Json)
}

pub async fn list_backlog(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<WorkItem>>> {
    db.list_backlog(group_id).map(Json)
}

pub async fn create_work_item(
    State(db): State<Database>,
    Path(group_id): Path<Uuid>,
    Json(input): Json<CreateWorkItemInput>,
) -> Result<(StatusCode, Json<WorkItem>)> {
    db.create_work_item(group_id, input)
        .map(|w| (StatusCode::CREATED, Json(w)))
}

pub async fn update_work_item(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWorkItemInput>,
) -> Result<Json<WorkItem>> {
    db.update_work_item(id, input)?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("Work item", id))
}
