use chrono::{TimeZone, Utc};
use cohort::db::Database;
use cohort::error::CoreError;
use cohort::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn create_test_project(db: &Database, name: &str) -> Project {
    db.create_project(CreateProjectInput {
        name: name.to_string(),
        ..Default::default()
    })
    .expect("Failed to create project")
}

fn enroll(db: &Database, project_id: Uuid, user_ref: &str) -> Participant {
    db.enroll_participant(
        project_id,
        EnrollParticipantInput {
            user_ref: user_ref.to_string(),
        },
    )
    .expect("Failed to enroll participant")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "projects" {
        describe "create_project" {
            it "defaults to a mandatory team project without deadlines" {
                let project = create_test_project(&db, "Capstone");

                assert_eq!(project.name, "Capstone");
                assert_eq!(project.project_type, ProjectType::Team);
                assert_eq!(project.participation_mode, ParticipationMode::Mandatory);
                assert!(!project.allow_self_formation);
                assert!(project.join_deadline.is_none());
                assert!(project.form_group_deadline.is_none());
            }

            it "stores every field" {
                let deadline = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
                let created = db.create_project(CreateProjectInput {
                    name: "Studio".to_string(),
                    project_type: ProjectType::Solo,
                    participation_mode: ParticipationMode::Optional,
                    allow_self_formation: true,
                    join_deadline: Some(deadline),
                    form_group_deadline: Some(deadline),
                }).expect("Failed to create project");

                let found = db.get_project(created.id).expect("Query failed").expect("Project missing");
                assert_eq!(found.project_type, ProjectType::Solo);
                assert_eq!(found.participation_mode, ParticipationMode::Optional);
                assert!(found.allow_self_formation);
                assert_eq!(found.join_deadline, Some(deadline));
                assert_eq!(found.form_group_deadline, Some(deadline));
            }

            it "rejects a blank name" {
                let result = db.create_project(CreateProjectInput {
                    name: "   ".to_string(),
                    ..Default::default()
                });
                assert!(matches!(result, Err(CoreError::InvalidParameter(_))));
            }
        }

        describe "get_project" {
            it "returns None for non-existent project" {
                let result = db.get_project(Uuid::new_v4()).expect("Query failed");
                assert!(result.is_none());
            }
        }

        describe "get_all_projects" {
            it "lists projects by name" {
                create_test_project(&db, "Beta");
                create_test_project(&db, "Alpha");

                let names: Vec<String> = db.get_all_projects().expect("Query failed")
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                assert_eq!(names, vec!["Alpha", "Beta"]);
            }
        }

        describe "update_project" {
            it "changes only the given fields" {
                let project = create_test_project(&db, "Capstone");

                let updated = db.update_project(project.id, UpdateProjectInput {
                    participation_mode: Some(ParticipationMode::Optional),
                    ..Default::default()
                }).expect("Update failed").expect("Project missing");

                assert_eq!(updated.name, "Capstone");
                assert_eq!(updated.participation_mode, ParticipationMode::Optional);
            }

            it "sets and clears deadlines" {
                let project = create_test_project(&db, "Capstone");
                let deadline = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

                let updated = db.update_project(project.id, UpdateProjectInput {
                    join_deadline: Some(Some(deadline)),
                    ..Default::default()
                }).expect("Update failed").expect("Project missing");
                assert_eq!(updated.join_deadline, Some(deadline));

                let cleared = db.update_project(project.id, UpdateProjectInput {
                    join_deadline: Some(None),
                    ..Default::default()
                }).expect("Update failed").expect("Project missing");
                assert!(cleared.join_deadline.is_none());
            }

            it "returns None for non-existent project" {
                let result = db.update_project(Uuid::new_v4(), UpdateProjectInput::default())
                    .expect("Update failed");
                assert!(result.is_none());
            }
        }

        describe "delete_project" {
            it "removes the project with its participants and groups" {
                let project = create_test_project(&db, "Capstone");
                let alice = enroll(&db, project.id, "alice");
                enroll(&db, project.id, "bob");
                let formed = db.partition_groups(project.id, PartitionGroupsInput {
                    group_size: 2,
                    apply_type: ApplyScope::WithoutGroup,
                }).expect("Partition failed");
                let group_id = formed.groups[0].group.id;

                assert!(db.delete_project(project.id).expect("Delete failed"));

                assert!(db.get_project(project.id).expect("Query failed").is_none());
                assert!(db.get_participant(alice.id).expect("Query failed").is_none());
                assert!(db.get_group(group_id).expect("Query failed").is_none());
            }

            it "returns false for non-existent project" {
                assert!(!db.delete_project(Uuid::new_v4()).expect("Delete failed"));
            }
        }
    }

    describe "participants" {
        describe "enroll_participant" {
            it "enrolls without a group" {
                let project = create_test_project(&db, "Capstone");
                let participant = enroll(&db, project.id, "alice");

                assert_eq!(participant.project_id, project.id);
                assert_eq!(participant.user_ref, "alice");
                assert!(participant.group_id.is_none());
                assert!(participant.role.is_none());
            }

            it "rejects a second enrollment of the same person" {
                let project = create_test_project(&db, "Capstone");
                enroll(&db, project.id, "alice");

                let result = db.enroll_participant(project.id, EnrollParticipantInput {
                    user_ref: "alice".to_string(),
                });
                assert!(matches!(result, Err(CoreError::Conflict(_))));
            }

            it "allows the same person in different projects" {
                let first = create_test_project(&db, "First");
                let second = create_test_project(&db, "Second");

                enroll(&db, first.id, "alice");
                enroll(&db, second.id, "alice");
            }

            it "rejects an unknown project" {
                let result = db.enroll_participant(Uuid::new_v4(), EnrollParticipantInput {
                    user_ref: "alice".to_string(),
                });
                assert!(matches!(result, Err(CoreError::NotFound(_))));
            }

            it "rejects an empty user reference" {
                let project = create_test_project(&db, "Capstone");
                let result = db.enroll_participant(project.id, EnrollParticipantInput {
                    user_ref: "".to_string(),
                });
                assert!(matches!(result, Err(CoreError::InvalidParameter(_))));
            }
        }

        describe "get_participants_by_project" {
            it "lists participants in enrollment order" {
                let project = create_test_project(&db, "Capstone");
                let other = create_test_project(&db, "Other");
                enroll(&db, project.id, "carol");
                enroll(&db, project.id, "alice");
                enroll(&db, other.id, "bob");

                let refs: Vec<String> = db.get_participants_by_project(project.id)
                    .expect("Query failed")
                    .into_iter()
                    .map(|p| p.user_ref)
                    .collect();
                assert_eq!(refs, vec!["carol", "alice"]);
            }
        }
    }

    describe "on-disk database" {
        it "persists data across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("cohort.db");

            let disk = Database::open(path.clone()).expect("Failed to open database");
            disk.migrate().expect("Failed to migrate");
            let project = create_test_project(&disk, "Persistent");
            drop(disk);

            let reopened = Database::open(path).expect("Failed to reopen database");
            reopened.migrate().expect("Failed to migrate");
            let found = reopened.get_project(project.id).expect("Query failed");
            assert_eq!(found.map(|p| p.name), Some("Persistent".to_string()));
        }
    }
}
