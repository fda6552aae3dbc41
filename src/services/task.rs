use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::models::milestone::ReviewVerdict;
use crate::models::notification::NotificationType;
use crate::models::project::Project;
use crate::models::task::{Task, TaskProof, TaskStatus, TaskSubmission};
use crate::models::user::{Caller, Role};
use crate::models::Priority;
use crate::services::auth::{Action, AuthGate};
use crate::services::db::{Database, Versioned};
use crate::services::notification::{NotificationRefs, Notifier};
use crate::services::storage::{FileStore, Upload};
use crate::services::user::normalize_email;

/// a submission carries at most this many screenshots
pub const MAX_SCREENSHOTS_PER_TASK: usize = 5;

pub struct CreateTaskInput {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub story_points: u32,
    pub sprint_id: Option<Uuid>,
    pub assignee_email: Option<String>,
}

/// Smaller units of work, optionally sprint-assigned and optionally gated
/// behind a submit-then-review round.
pub struct TaskService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    files: Arc<dyn FileStore>,
    auth: AuthGate,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl TaskService {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<Notifier>,
        files: Arc<dyn FileStore>,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            notifier,
            files,
            auth: AuthGate,
            config,
            clock,
        }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        project_id: Uuid,
        input: CreateTaskInput,
    ) -> CoreResult<Task> {
        let project = self.fetch_project(project_id)?;
        self.auth.authorize(caller, Action::EditTask, &project)?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("a task title is required".into()));
        }

        if let Some(sprint_id) = input.sprint_id {
            let sprint = self
                .db
                .sprints
                .get(sprint_id)
                .ok_or_else(|| CoreError::NotFound("sprint not found".into()))?;
            if sprint.doc.project_id != project_id {
                return Err(CoreError::Validation(
                    "the sprint belongs to a different project".into(),
                ));
            }
        }

        // the assignee email resolves to an account id right now, not later
        let assignee = match &input.assignee_email {
            Some(email) => Some(self.resolve_assignee(email)?),
            None => None,
        };

        let now = self.clock.now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id,
            sprint_id: input.sprint_id,
            title: title.to_owned(),
            description: input.description.trim().to_owned(),
            assignee,
            status: TaskStatus::Pending,
            priority: input.priority,
            story_points: input.story_points,
            submission: TaskSubmission::None,
            is_verified: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.db.tasks.insert(task.id, task.clone());

        if let Some(assignee) = assignee {
            self.notifier.notify(
                assignee,
                NotificationType::TaskAssigned,
                "Task assigned",
                &format!("\"{}\" was assigned to you", task.title),
                NotificationRefs::project(project_id),
                caller.id,
            );
        }

        Ok(task)
    }

    /// hand the task to someone else, resolved from their email
    pub async fn assign(&self, caller: &Caller, task_id: Uuid, email: &str) -> CoreResult<Task> {
        let current = self.fetch(task_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth.authorize(caller, Action::EditTask, &project)?;
        self.guard_verified(&current.doc, caller, &project)?;

        let assignee = self.resolve_assignee(email)?;
        let now = self.clock.now();
        let mut updated = current.doc.clone();
        updated.assignee = Some(assignee);
        updated.updated_at = now;
        self.db
            .tasks
            .try_replace(task_id, current.version, updated.clone())?;

        self.notifier.notify(
            assignee,
            NotificationType::TaskAssigned,
            "Task assigned",
            &format!("\"{}\" was assigned to you", updated.title),
            NotificationRefs::project(updated.project_id),
            caller.id,
        );

        Ok(updated)
    }

    /**
     * move the task between workflow stages
     * on projects that gate story-pointed work behind review, a student
     * cannot jump straight to Completed, the proof has to go through a
     * submission round instead
     */
    pub async fn update_status(
        &self,
        caller: &Caller,
        task_id: Uuid,
        status: TaskStatus,
    ) -> CoreResult<Task> {
        let current = self.fetch(task_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth.authorize(caller, Action::EditTask, &project)?;
        self.guard_verified(&current.doc, caller, &project)?;

        if status == TaskStatus::Completed
            && caller.role == Role::Student
            && project.requires_task_review
            && current.doc.story_points > 0
        {
            return Err(CoreError::Forbidden(
                "story-pointed tasks are completed through submission review".into(),
            ));
        }

        let now = self.clock.now();
        let mut updated = current.doc.clone();
        updated.status = status;
        updated.completed_at = match status {
            TaskStatus::Completed => Some(now),
            _ => None,
        };
        updated.updated_at = now;
        self.db
            .tasks
            .try_replace(task_id, current.version, updated.clone())?;
        Ok(updated)
    }

    /**
     * submit proof-of-work for review
     * every screenshot is validated before a single byte is uploaded
     */
    pub async fn submit(
        &self,
        caller: &Caller,
        task_id: Uuid,
        github_link: &str,
        screenshots: Vec<Upload>,
    ) -> CoreResult<Task> {
        let current = self.fetch(task_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth.authorize(caller, Action::EditTask, &project)?;
        self.guard_verified(&current.doc, caller, &project)?;

        let github_link = github_link.trim();
        if github_link.is_empty() {
            return Err(CoreError::Validation("a repository link is required".into()));
        }

        if screenshots.len() > MAX_SCREENSHOTS_PER_TASK {
            return Err(CoreError::Validation(format!(
                "at most {MAX_SCREENSHOTS_PER_TASK} screenshots are allowed"
            )));
        }
        for screenshot in &screenshots {
            if !screenshot.content_type.starts_with("image/") {
                return Err(CoreError::Validation(format!(
                    "{} is not an image",
                    screenshot.name
                )));
            }
            if screenshot.bytes.len() > self.config.max_screenshot_bytes {
                return Err(CoreError::Validation(format!(
                    "{} exceeds the {} byte ceiling",
                    screenshot.name, self.config.max_screenshot_bytes
                )));
            }
        }

        match current.doc.status {
            TaskStatus::InProgress => {}
            TaskStatus::Pending => {
                return Err(CoreError::Validation(
                    "start the task before submitting it".into(),
                ))
            }
            TaskStatus::Completed => {
                return Err(CoreError::Validation(
                    "the task is already completed".into(),
                ))
            }
        }
        if matches!(current.doc.submission, TaskSubmission::PendingReview { .. }) {
            return Err(CoreError::Conflict(
                "a submission is already awaiting review".into(),
            ));
        }

        // only now do the blobs leave the building
        let mut stored = Vec::with_capacity(screenshots.len());
        for screenshot in screenshots {
            let file = self.files.put(screenshot).await.map_err(|err| {
                CoreError::Unavailable(format!("screenshot storage failed: {err:#}"))
            })?;
            stored.push(file);
        }

        let now = self.clock.now();
        let mut updated = current.doc.clone();
        updated.submission = TaskSubmission::PendingReview {
            proof: TaskProof {
                github_link: github_link.to_owned(),
                screenshots: stored,
                submitted_at: now,
            },
        };
        updated.updated_at = now;
        self.db
            .tasks
            .try_replace(task_id, current.version, updated.clone())?;
        info!("task {} submitted for review by {}", task_id, caller.id);

        if let Some(mentor) = project.mentor {
            self.notifier.notify(
                mentor,
                NotificationType::TaskSubmitted,
                "Task submitted",
                &format!("\"{}\" is ready for review", updated.title),
                NotificationRefs::project(project.id),
                caller.id,
            );
        }

        Ok(updated)
    }

    /**
     * mentor or admin verdict on the pending proof
     * approval completes and verifies the task in one stroke, rejection
     * sends it back to in-progress for another round
     */
    pub async fn review(
        &self,
        caller: &Caller,
        task_id: Uuid,
        verdict: ReviewVerdict,
    ) -> CoreResult<Task> {
        let current = self.fetch(task_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth.authorize(caller, Action::ReviewTask, &project)?;

        let proof = match &current.doc.submission {
            TaskSubmission::PendingReview { proof } => proof.clone(),
            TaskSubmission::Approved { .. } | TaskSubmission::Rejected { .. } => {
                return Err(CoreError::Conflict(
                    "this submission was already reviewed".into(),
                ))
            }
            TaskSubmission::None => {
                return Err(CoreError::Validation(
                    "no submission is awaiting review".into(),
                ))
            }
        };

        let now = self.clock.now();
        let mut updated = current.doc.clone();
        match verdict {
            ReviewVerdict::Approve => {
                updated.status = TaskStatus::Completed;
                updated.is_verified = true;
                updated.completed_at = Some(now);
                updated.submission = TaskSubmission::Approved {
                    proof,
                    approved_at: now,
                };
            }
            ReviewVerdict::Reject => {
                updated.status = TaskStatus::InProgress;
                updated.submission = TaskSubmission::Rejected {
                    proof,
                    rejected_at: now,
                };
            }
        }
        updated.updated_at = now;
        self.db
            .tasks
            .try_replace(task_id, current.version, updated.clone())?;

        if let Some(assignee) = updated.assignee {
            let (kind, title) = match verdict {
                ReviewVerdict::Approve => (NotificationType::TaskApproved, "Task approved"),
                ReviewVerdict::Reject => (NotificationType::TaskRejected, "Task rejected"),
            };
            self.notifier.notify(
                assignee,
                kind,
                title,
                &format!("\"{}\" was reviewed", updated.title),
                NotificationRefs::project(project.id),
                caller.id,
            );
        }

        Ok(updated)
    }

    pub async fn get(&self, task_id: Uuid) -> CoreResult<Task> {
        Ok(self.fetch(task_id)?.doc)
    }

    pub async fn list_for_project(&self, project_id: Uuid) -> Vec<Task> {
        let mut out = self.db.tasks.find(|t| t.project_id == project_id);
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// a verified task is frozen for everyone below staff
    fn guard_verified(&self, task: &Task, caller: &Caller, project: &Project) -> CoreResult<()> {
        if task.is_verified && !self.auth.is_staff(caller, project) {
            return Err(CoreError::Forbidden(
                "a verified task can no longer be edited".into(),
            ));
        }
        Ok(())
    }

    fn resolve_assignee(&self, email: &str) -> CoreResult<Uuid> {
        let email = normalize_email(email)?;
        self.db
            .users
            .find(|u| u.email.eq_ignore_ascii_case(&email))
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| CoreError::Validation(format!("no registered account for {email}")))
    }

    fn fetch(&self, task_id: Uuid) -> CoreResult<Versioned<Task>> {
        self.db
            .tasks
            .get(task_id)
            .ok_or_else(|| CoreError::NotFound("task not found".into()))
    }

    fn fetch_project(&self, project_id: Uuid) -> CoreResult<Project> {
        self.db
            .projects
            .get(project_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))
    }
}
