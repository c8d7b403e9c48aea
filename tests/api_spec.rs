use axum::http::StatusCode;
use axum_test::TestServer;
use cohort::api::create_router;
use cohort::db::Database;
use cohort::models::*;
use serde_json::json;
use uuid::Uuid;

const ACTOR: &str = "X-Participant-Id";

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db);
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_test_project(server: &TestServer) -> Project {
    server
        .post("/api/v1/projects")
        .json(&CreateProjectInput {
            name: "Test Project".to_string(),
            participation_mode: ParticipationMode::Optional,
            allow_self_formation: true,
            ..Default::default()
        })
        .await
        .json::<Project>()
}

async fn enroll(server: &TestServer, project_id: Uuid, user_ref: &str) -> Participant {
    server
        .post(&format!("/api/v1/projects/{}/participants", project_id))
        .json(&EnrollParticipantInput {
            user_ref: user_ref.to_string(),
        })
        .await
        .json::<Participant>()
}

/// Project with `n` participants partitioned into groups of at most `size`.
async fn formed_project(server: &TestServer, n: usize, size: i64) -> (Project, PartitionResult) {
    let project = create_test_project(server).await;
    for i in 0..n {
        enroll(server, project.id, &format!("student-{}", i)).await;
    }
    let result = server
        .post(&format!("/api/v1/projects/{}/groups/partition", project.id))
        .json(&json!({ "group_size": size, "apply_type": "without-group" }))
        .await
        .json::<PartitionResult>();
    (project, result)
}

// ============================================================
// Health
// ============================================================

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

// ============================================================
// Projects
// ============================================================

mod projects {
    use super::*;

    #[tokio::test]
    async fn creates_and_fetches_a_project() {
        let server = setup();
        let project = create_test_project(&server).await;

        let response = server.get(&format!("/api/v1/projects/{}", project.id)).await;

        response.assert_status_ok();
        let fetched: Project = response.json();
        assert_eq!(fetched.id, project.id);
        assert!(fetched.allow_self_formation);
    }

    #[tokio::test]
    async fn create_returns_created() {
        let server = setup();

        let response = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Minimal" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let project: Project = response.json();
        assert_eq!(project.project_type, ProjectType::Team);
    }

    #[tokio::test]
    async fn blank_name_is_bad_request() {
        let server = setup();

        let response = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "" }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn update_clears_a_deadline_with_null() {
        let server = setup();
        let project = create_test_project(&server).await;
        server
            .put(&format!("/api/v1/projects/{}", project.id))
            .json(&json!({ "join_deadline": "2026-06-01T00:00:00Z" }))
            .await
            .assert_status_ok();

        let response = server
            .put(&format!("/api/v1/projects/{}", project.id))
            .json(&json!({ "join_deadline": null }))
            .await;

        response.assert_status_ok();
        let updated: Project = response.json();
        assert!(updated.join_deadline.is_none());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let server = setup();
        let project = create_test_project(&server).await;

        server
            .delete(&format!("/api/v1/projects/{}", project.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/api/v1/projects/{}", project.id))
            .await
            .assert_status_not_found();
    }
}

// ============================================================
// Participants
// ============================================================

mod participants {
    use super::*;

    #[tokio::test]
    async fn enrolls_and_lists() {
        let server = setup();
        let project = create_test_project(&server).await;
        enroll(&server, project.id, "alice").await;
        enroll(&server, project.id, "bob").await;

        let response = server
            .get(&format!("/api/v1/projects/{}/participants", project.id))
            .await;

        response.assert_status_ok();
        let participants: Vec<Participant> = response.json();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].user_ref, "alice");
    }

    #[tokio::test]
    async fn duplicate_enrollment_is_conflict() {
        let server = setup();
        let project = create_test_project(&server).await;
        enroll(&server, project.id, "alice").await;

        let response = server
            .post(&format!("/api/v1/projects/{}/participants", project.id))
            .json(&json!({ "user_ref": "alice" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let server = setup();

        server
            .get(&format!("/api/v1/projects/{}/participants", Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }
}

// ============================================================
// Groups
// ============================================================

mod groups {
    use super::*;

    #[tokio::test]
    async fn partition_reports_the_number_of_groups() {
        let server = setup();
        let (project, result) = formed_project(&server, 11, 5).await;

        assert_eq!(result.num_of_groups, 3);

        let response = server
            .get(&format!("/api/v1/projects/{}/groups", project.id))
            .await;
        response.assert_status_ok();
        let groups: Vec<GroupWithMembers> = response.json();
        let sizes: Vec<usize> = groups.iter().map(|g| g.members.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
    }

    #[tokio::test]
    async fn partition_rejects_oversized_groups() {
        let server = setup();
        let project = create_test_project(&server).await;
        enroll(&server, project.id, "alice").await;

        let response = server
            .post(&format!("/api/v1/projects/{}/groups/partition", project.id))
            .json(&json!({ "group_size": 2, "apply_type": "all" }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn partition_after_deadline_is_unprocessable() {
        let server = setup();
        let project = create_test_project(&server).await;
        enroll(&server, project.id, "alice").await;
        server
            .put(&format!("/api/v1/projects/{}", project.id))
            .json(&json!({ "form_group_deadline": "2000-01-01T00:00:00Z" }))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/v1/projects/{}/groups/partition", project.id))
            .json(&json!({ "group_size": 1, "apply_type": "without-group" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn student_creates_own_group() {
        let server = setup();
        let project = create_test_project(&server).await;
        let alice = enroll(&server, project.id, "alice").await;

        let response = server
            .post(&format!("/api/v1/projects/{}/groups", project.id))
            .add_header(ACTOR, alice.id.to_string())
            .await;

        response.assert_status(StatusCode::CREATED);
        let group: GroupWithMembers = response.json();
        assert_eq!(group.leader().map(|p| p.id), Some(alice.id));
    }

    #[tokio::test]
    async fn missing_actor_is_bad_request() {
        let server = setup();
        let project = create_test_project(&server).await;

        let response = server
            .post(&format!("/api/v1/projects/{}/groups", project.id))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let server = setup();

        server
            .get(&format!("/api/v1/groups/{}", Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn only_the_leader_toggles_auto_accept() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group = &formed.groups[0];
        let member = group.members[1].id;

        let response = server
            .put(&format!("/api/v1/groups/{}/auto-accept", group.group.id))
            .add_header(ACTOR, member.to_string())
            .json(&json!({ "auto_accept": true }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }
}

// ============================================================
// Membership
// ============================================================

mod membership {
    use super::*;

    #[tokio::test]
    async fn join_request_is_accepted_by_the_leader() {
        let server = setup();
        let (project, formed) = formed_project(&server, 2, 2).await;
        let group = &formed.groups[0];
        let leader = group.members[0].id;
        let newcomer = enroll(&server, project.id, "newcomer").await;

        let response = server
            .post(&format!("/api/v1/groups/{}/join-requests", group.group.id))
            .add_header(ACTOR, newcomer.id.to_string())
            .await;
        response.assert_status(StatusCode::CREATED);
        let request = match response.json::<JoinOutcome>() {
            JoinOutcome::Requested { request } => request,
            other => panic!("expected a pending request, got {:?}", other),
        };

        let pending: Vec<JoinRequest> = server
            .get(&format!("/api/v1/groups/{}/join-requests", group.group.id))
            .await
            .json();
        assert_eq!(pending.len(), 1);

        let response = server
            .post(&format!(
                "/api/v1/groups/{}/join-requests/{}/accept",
                group.group.id, request.id
            ))
            .add_header(ACTOR, leader.to_string())
            .await;

        response.assert_status_ok();
        let resolution: JoinRequestResolution = response.json();
        assert_eq!(resolution.participant.group_id, Some(group.group.id));
    }

    #[tokio::test]
    async fn non_leader_cannot_accept() {
        let server = setup();
        let (project, formed) = formed_project(&server, 2, 2).await;
        let group = &formed.groups[0];
        let member = group.members[1].id;
        let newcomer = enroll(&server, project.id, "newcomer").await;
        let outcome: JoinOutcome = server
            .post(&format!("/api/v1/groups/{}/join-requests", group.group.id))
            .add_header(ACTOR, newcomer.id.to_string())
            .await
            .json();
        let JoinOutcome::Requested { request } = outcome else {
            panic!("expected a pending request");
        };

        let response = server
            .post(&format!(
                "/api/v1/groups/{}/join-requests/{}/accept",
                group.group.id, request.id
            ))
            .add_header(ACTOR, member.to_string())
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn requester_withdraws() {
        let server = setup();
        let (project, formed) = formed_project(&server, 2, 2).await;
        let group_id = formed.groups[0].group.id;
        let newcomer = enroll(&server, project.id, "newcomer").await;
        let outcome: JoinOutcome = server
            .post(&format!("/api/v1/groups/{}/join-requests", group_id))
            .add_header(ACTOR, newcomer.id.to_string())
            .await
            .json();
        let JoinOutcome::Requested { request } = outcome else {
            panic!("expected a pending request");
        };

        let response = server
            .delete(&format!("/api/v1/join-requests/{}", request.id))
            .add_header(ACTOR, newcomer.id.to_string())
            .await;

        response.assert_status_ok();
        let withdrawn: JoinRequest = response.json();
        assert_eq!(withdrawn.status, JoinRequestStatus::Withdrawn);
    }

    #[tokio::test]
    async fn leadership_transfer_then_leave() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group = &formed.groups[0];
        let leader = group.members[0].id;
        let member = group.members[1].id;

        let response = server
            .post(&format!("/api/v1/groups/{}/leader", group.group.id))
            .add_header(ACTOR, leader.to_string())
            .json(&json!({ "participant_id": member }))
            .await;
        response.assert_status_ok();
        let updated: GroupWithMembers = response.json();
        assert_eq!(updated.leader().map(|p| p.id), Some(member));

        let response = server
            .post(&format!("/api/v1/groups/{}/leave", group.group.id))
            .add_header(ACTOR, leader.to_string())
            .await;
        response.assert_status_ok();
        let left: Participant = response.json();
        assert!(left.group_id.is_none());
    }

    #[tokio::test]
    async fn leader_removes_member() {
        let server = setup();
        let (_, formed) = formed_project(&server, 3, 3).await;
        let group = &formed.groups[0];
        let leader = group.members[0].id;
        let member = group.members[2].id;

        let response = server
            .delete(&format!(
                "/api/v1/groups/{}/members/{}",
                group.group.id, member
            ))
            .add_header(ACTOR, leader.to_string())
            .await;

        response.assert_status_ok();
        let updated: GroupWithMembers = response.json();
        assert_eq!(updated.members.len(), 2);
    }

    #[tokio::test]
    async fn leader_cannot_leave_a_populated_group() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group = &formed.groups[0];

        let response = server
            .post(&format!("/api/v1/groups/{}/leave", group.group.id))
            .add_header(ACTOR, group.members[0].id.to_string())
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }
}

// ============================================================
// Sprints
// ============================================================

mod sprints {
    use super::*;

    async fn active_sprint(server: &TestServer, group_id: Uuid) -> Sprint {
        let sprint: Sprint = server
            .post(&format!("/api/v1/groups/{}/sprints", group_id))
            .json(&json!({ "name": "Sprint 1" }))
            .await
            .json();
        server
            .post(&format!("/api/v1/sprints/{}/start", sprint.id))
            .await
            .json()
    }

    async fn add_item(server: &TestServer, group_id: Uuid, sprint_id: Uuid, status: &str) -> WorkItem {
        server
            .post(&format!("/api/v1/groups/{}/work-items", group_id))
            .json(&json!({ "title": "Task", "status": status, "sprint_id": sprint_id }))
            .await
            .json()
    }

    #[tokio::test]
    async fn completion_without_disposition_is_bad_request() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group_id = formed.groups[0].group.id;
        let sprint = active_sprint(&server, group_id).await;
        add_item(&server, group_id, sprint.id, "todo").await;

        let response = server
            .post(&format!("/api/v1/sprints/{}/complete", sprint.id))
            .json(&json!({}))
            .await;

        response.assert_status_bad_request();
        let stored: Sprint = server
            .get(&format!("/api/v1/sprints/{}", sprint.id))
            .await
            .json();
        assert_eq!(stored.status, SprintStatus::Active);
    }

    #[tokio::test]
    async fn completion_moves_unfinished_work_to_backlog() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group_id = formed.groups[0].group.id;
        let sprint = active_sprint(&server, group_id).await;
        add_item(&server, group_id, sprint.id, "done").await;
        let open = add_item(&server, group_id, sprint.id, "in_progress").await;

        let response = server
            .post(&format!("/api/v1/sprints/{}/complete", sprint.id))
            .json(&json!({ "move_to_backlog": true }))
            .await;

        response.assert_status_ok();
        let result: SprintCompletionResult = response.json();
        assert_eq!(result.done_count, 1);
        assert_eq!(result.moved_work_item_ids, vec![open.id]);

        let backlog: Vec<WorkItem> = server
            .get(&format!("/api/v1/groups/{}/backlog", group_id))
            .await
            .json();
        assert_eq!(backlog.len(), 1);
        let kept: Vec<WorkItem> = server
            .get(&format!("/api/v1/sprints/{}/work-items", sprint.id))
            .await
            .json();
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn second_active_sprint_is_conflict() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group_id = formed.groups[0].group.id;
        active_sprint(&server, group_id).await;
        let second: Sprint = server
            .post(&format!("/api/v1/groups/{}/sprints", group_id))
            .json(&json!({ "name": "Sprint 2" }))
            .await
            .json();

        let response = server
            .post(&format!("/api/v1/sprints/{}/start", second.id))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn work_item_update_moves_it_to_backlog() {
        let server = setup();
        let (_, formed) = formed_project(&server, 2, 2).await;
        let group_id = formed.groups[0].group.id;
        let sprint = active_sprint(&server, group_id).await;
        let item = add_item(&server, group_id, sprint.id, "todo").await;

        let response = server
            .put(&format!("/api/v1/work-items/{}", item.id))
            .json(&json!({ "sprint_id": null }))
            .await;

        response.assert_status_ok();
        let updated: WorkItem = response.json();
        assert!(updated.sprint_id.is_none());
    }
}

// ============================================================
// Security - API Key Authentication
// ============================================================

mod security_auth {
    use super::*;
    use cohort::api::{create_router_with_config, SecurityConfig};

    fn setup_with_auth(api_key: &str) -> TestServer {
        let db = Database::open_memory().expect("Failed to create database");
        db.migrate().expect("Failed to migrate");
        let config = SecurityConfig::with_api_key(api_key);
        let app = create_router_with_config(db, config);
        TestServer::new(app).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn health_endpoint_is_accessible_without_auth() {
        let server = setup_with_auth("test-secret-key");

        server.get("/api/v1/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn protected_endpoint_requires_auth() {
        let server = setup_with_auth("test-secret-key");

        let response = server.get("/api/v1/projects").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_endpoint_accepts_valid_bearer_token() {
        let server = setup_with_auth("test-secret-key");

        let response = server
            .get("/api/v1/projects")
            .add_header("Authorization", "Bearer test-secret-key")
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn protected_endpoint_rejects_invalid_bearer_token() {
        let server = setup_with_auth("test-secret-key");

        let response = server
            .get("/api/v1/projects")
            .add_header("Authorization", "Bearer wrong-key")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_endpoint_rejects_malformed_auth_header() {
        let server = setup_with_auth("test-secret-key");

        let response = server
            .get("/api/v1/projects")
            .add_header("Authorization", "Basic dXNlcjpwYXNz")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
