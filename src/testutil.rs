//! shared fixtures for the unit tests

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, ManualClock};
use crate::models::milestone::Milestone;
use crate::models::notification::Notification;
use crate::models::project::Project;
use crate::models::sprint::Sprint;
use crate::models::task::Task;
use crate::models::user::{Caller, Role, User};
use crate::models::Priority;
use crate::services::meeting::ScheduleMeetingInput;
use crate::services::milestone::CreateMilestoneInput;
use crate::services::project::CreateProjectInput;
use crate::services::sprint::CreateSprintInput;
use crate::services::storage::{MemoryFileStore, Upload};
use crate::services::task::CreateTaskInput;
use crate::{Config, Core};

pub(crate) struct TestCore {
    pub core: Core,
    pub clock: Arc<ManualClock>,
    pub files: Arc<MemoryFileStore>,
}

/// a core on a manual clock parked at monday 2026-01-05 09:00 UTC
pub(crate) fn test_core() -> TestCore {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
    ));
    let files = MemoryFileStore::new();
    let core = Core::new(clock.clone(), files.clone(), Config::default());
    TestCore { core, clock, files }
}

pub(crate) fn png_upload(name: &str, size: usize) -> Upload {
    Upload {
        name: name.into(),
        content_type: "image/png".into(),
        bytes: vec![0u8; size],
    }
}

impl TestCore {
    pub async fn register_student(&self, name: &str, email: &str) -> User {
        self.core
            .users
            .register(name, email, Role::Student)
            .await
            .expect("registering a student")
    }

    pub async fn register_mentor(&self, name: &str, email: &str) -> User {
        self.core
            .users
            .register(name, email, Role::Mentor)
            .await
            .expect("registering a mentor")
    }

    pub async fn student(&self, name: &str, email: &str) -> Caller {
        let user = self.register_student(name, email).await;
        Caller::new(user.id, Role::Student)
    }

    pub async fn admin(&self) -> Caller {
        let user = self
            .core
            .users
            .register("Root", &format!("admin-{}@hub.test", Uuid::new_v4()), Role::Admin)
            .await
            .expect("registering an admin");
        Caller::new(user.id, Role::Admin)
    }

    /// a project created by a student owner with a mentor already assigned
    pub async fn project_with_mentor(&self) -> (Project, Caller, Caller) {
        let owner = self
            .student(
                "Owner",
                &format!("owner-{}@hub.test", Uuid::new_v4()),
            )
            .await;
        let mentor_user = self
            .register_mentor("Mentor", &format!("mentor-{}@hub.test", Uuid::new_v4()))
            .await;
        let mentor = Caller::new(mentor_user.id, Role::Mentor);

        let project = self
            .core
            .projects
            .create(
                &owner,
                CreateProjectInput {
                    title: "Capstone".into(),
                    description: "team project".into(),
                    github_repo: None,
                    requires_task_review: true,
                },
            )
            .await
            .expect("creating the project");

        let admin = self.admin().await;
        let project = self
            .core
            .projects
            .assign_mentor(&admin, project.id, mentor_user.id)
            .await
            .expect("assigning the mentor");

        (project, mentor, owner)
    }

    pub async fn milestone(&self, staff: &Caller, project_id: Uuid, title: &str) -> Milestone {
        self.core
            .milestones
            .create(
                staff,
                project_id,
                CreateMilestoneInput {
                    title: title.into(),
                    description: String::new(),
                    due_date: None,
                    priority: Priority::Medium,
                    sub_milestones: vec![],
                },
            )
            .await
            .expect("creating a milestone")
    }

    pub async fn pointed_task(&self, staff: &Caller, project_id: Uuid, points: u32) -> Task {
        self.core
            .tasks
            .create(
                staff,
                project_id,
                CreateTaskInput {
                    title: format!("task worth {points}"),
                    description: String::new(),
                    priority: Priority::Medium,
                    story_points: points,
                    sprint_id: None,
                    assignee_email: None,
                },
            )
            .await
            .expect("creating a task")
    }

    pub async fn sprint(
        &self,
        staff: &Caller,
        project_id: Uuid,
        start: &str,
        end: &str,
    ) -> Sprint {
        let start = format!("{start}T00:00:00Z").parse().expect("start date");
        let end = format!("{end}T00:00:00Z").parse().expect("end date");
        self.core
            .sprints
            .create(
                staff,
                project_id,
                CreateSprintInput {
                    name: "sprint".into(),
                    goal: String::new(),
                    start_date: start,
                    end_date: end,
                },
            )
            .await
            .expect("creating a sprint")
    }

    pub async fn meeting(
        &self,
        mentor: &Caller,
        project_id: Uuid,
        title: &str,
    ) -> crate::models::meeting::Meeting {
        self.core
            .meetings
            .create(
                mentor,
                project_id,
                ScheduleMeetingInput {
                    title: title.into(),
                    description: String::new(),
                    meeting_link: Some("https://meet.example/room".into()),
                    scheduled_at: self.clock.now() + chrono::Duration::hours(24),
                    duration_minutes: 30,
                },
            )
            .await
            .expect("scheduling a meeting")
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.core
            .db
            .notifications
            .find(|n| n.recipient == user_id)
    }
}
