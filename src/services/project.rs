use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::notification::NotificationType;
use crate::models::project::{Project, ProjectStatus};
use crate::models::user::{Caller, Role};
use crate::services::auth::{Action, AuthGate};
use crate::services::db::Database;
use crate::services::github::{RepoActivity, SourceHostClient};
use crate::services::notification::{NotificationRefs, Notifier};

pub struct CreateProjectInput {
    pub title: String,
    pub description: String,
    pub github_repo: Option<String>,
    pub requires_task_review: bool,
}

/// Aggregate root operations: everything else hangs off a project.
pub struct ProjectService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    auth: AuthGate,
    clock: Arc<dyn Clock>,
}

impl ProjectService {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            notifier,
            auth: AuthGate,
            clock,
        }
    }

    /**
     * create a project
     * a student creator becomes its single owner, a mentor creator its
     * single mentor
     */
    pub async fn create(&self, caller: &Caller, input: CreateProjectInput) -> CoreResult<Project> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("a project title is required".into()));
        }

        let now = self.clock.now();
        let project = Project {
            id: Uuid::new_v4(),
            title: title.to_owned(),
            description: input.description.trim().to_owned(),
            status: ProjectStatus::Planning,
            owner: (caller.role == Role::Student).then_some(caller.id),
            mentor: (caller.role == Role::Mentor).then_some(caller.id),
            created_by: caller.id,
            github_repo: input
                .github_repo
                .map(|link| link.trim().to_owned())
                .filter(|link| !link.is_empty()),
            requires_task_review: input.requires_task_review,
            milestones: vec![],
            team_members: vec![],
            created_at: now,
            updated_at: now,
        };
        self.db.projects.insert(project.id, project.clone());
        info!("project {} created by {}", project.id, caller.id);
        Ok(project)
    }

    /**
     * bind a mentor to the project, admin only
     */
    pub async fn assign_mentor(
        &self,
        caller: &Caller,
        project_id: Uuid,
        mentor_id: Uuid,
    ) -> CoreResult<Project> {
        let project = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth
            .authorize(caller, Action::AssignMentor, &project.doc)?;

        let mentor = self
            .db
            .users
            .get(mentor_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("mentor account not found".into()))?;
        if mentor.role != Role::Mentor {
            return Err(CoreError::Validation(format!(
                "{} is not a mentor account",
                mentor.email
            )));
        }

        let now = self.clock.now();
        let updated = self.db.projects.mutate(project_id, move |p| {
            match p.mentor {
                Some(existing) if existing != mentor_id => {
                    return Err(CoreError::Conflict(
                        "a different mentor is already assigned".into(),
                    ))
                }
                _ => {}
            }
            p.mentor = Some(mentor_id);
            p.updated_at = now;
            Ok(p.clone())
        })?;

        self.notifier.notify(
            mentor_id,
            NotificationType::MentorAssigned,
            "Assigned as mentor",
            &format!("You are now mentoring \"{}\"", updated.title),
            NotificationRefs::project(project_id),
            caller.id,
        );

        Ok(updated)
    }

    /**
     * move the project through its lifecycle
     * optimistic, a concurrent edit pushes the second writer to Conflict
     */
    pub async fn update_status(
        &self,
        caller: &Caller,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> CoreResult<Project> {
        let current = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth
            .authorize(caller, Action::UpdateProject, &current.doc)?;

        let mut updated = current.doc.clone();
        updated.status = status;
        updated.updated_at = self.clock.now();
        self.db
            .projects
            .try_replace(project_id, current.version, updated.clone())?;

        self.notifier.notify_many(
            &updated.participant_ids(),
            NotificationType::ProjectStatusChanged,
            "Project status changed",
            &format!("\"{}\" is now {:?}", updated.title, updated.status),
            NotificationRefs::project(project_id),
            caller.id,
        );

        Ok(updated)
    }

    /**
     * designate the canonical code repository milestone submissions are
     * checked against
     */
    pub async fn set_repository(
        &self,
        caller: &Caller,
        project_id: Uuid,
        link: &str,
    ) -> CoreResult<Project> {
        let link = link.trim();
        if link.is_empty() {
            return Err(CoreError::Validation("a repository link is required".into()));
        }

        let project = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth
            .authorize(caller, Action::UpdateProject, &project.doc)?;

        let now = self.clock.now();
        let link = link.to_owned();
        self.db.projects.mutate(project_id, move |p| {
            p.github_repo = Some(link);
            p.updated_at = now;
            Ok(p.clone())
        })
    }

    pub async fn get(&self, project_id: Uuid) -> CoreResult<Project> {
        self.db
            .projects
            .get(project_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))
    }

    /// every project the user created, owns, mentors or is a joined member of
    pub async fn list_for_user(&self, user_id: Uuid) -> Vec<Project> {
        let mut out = self.db.projects.find(|p| {
            p.created_by == user_id
                || p.owner == Some(user_id)
                || p.mentor == Some(user_id)
                || p.is_joined_member(user_id)
        });
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /**
     * compose the linked repository's activity through the source-host
     * collaborator, read-only
     */
    pub async fn repository_activity(
        &self,
        caller: &Caller,
        project_id: Uuid,
        client: &dyn SourceHostClient,
    ) -> CoreResult<RepoActivity> {
        let project = self.get(project_id).await?;
        self.auth.authorize(caller, Action::ViewProject, &project)?;

        let repo = project.github_repo.ok_or_else(|| {
            CoreError::Validation("the project has no linked repository".into())
        })?;

        let unavailable =
            |err: anyhow::Error| CoreError::Unavailable(format!("source host error: {err:#}"));

        let commits = client.commits(&repo).await.map_err(unavailable)?;
        let branches = client.branches(&repo).await.map_err(unavailable)?;
        let pull_requests = client.pull_requests(&repo).await.map_err(unavailable)?;
        let contributors = client.contributors(&repo).await.map_err(unavailable)?;

        Ok(RepoActivity {
            repo,
            commits,
            branches,
            pull_requests,
            contributors,
        })
    }
}
