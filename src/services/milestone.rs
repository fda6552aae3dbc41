use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::milestone::{
    Milestone, MilestoneState, Review, ReviewVerdict, SubMilestone, Submission,
};
use crate::models::notification::NotificationType;
use crate::models::user::Caller;
use crate::models::Priority;
use crate::services::auth::{Action, AuthGate};
use crate::services::db::Database;
use crate::services::notification::{NotificationRefs, Notifier};

/// repository links compare case-insensitively and ignore a trailing slash
fn canonical_repo(link: &str) -> String {
    link.trim().trim_end_matches('/').to_ascii_lowercase()
}

pub(crate) fn same_repo(a: &str, b: &str) -> bool {
    canonical_repo(a) == canonical_repo(b)
}

pub struct CreateMilestoneInput {
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub sub_milestones: Vec<String>,
}

/// Drives the submit / approve / reject cycle for mentor-reviewed
/// deliverables.
pub struct MilestoneService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    auth: AuthGate,
    clock: Arc<dyn Clock>,
}

impl MilestoneService {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            notifier,
            auth: AuthGate,
            clock,
        }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        project_id: Uuid,
        input: CreateMilestoneInput,
    ) -> CoreResult<Milestone> {
        let project = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth
            .authorize(caller, Action::CreateMilestone, &project.doc)?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("a milestone title is required".into()));
        }

        let now = self.clock.now();
        let milestone = Milestone {
            id: Uuid::new_v4(),
            project_id,
            title: title.to_owned(),
            description: input.description.trim().to_owned(),
            due_date: input.due_date,
            priority: input.priority,
            state: MilestoneState::NotStarted { rejection: None },
            sub_milestones: input
                .sub_milestones
                .into_iter()
                .map(|title| SubMilestone {
                    title,
                    completed: false,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };
        self.db.milestones.insert(milestone.id, milestone.clone());

        // keep the project's ordered list in step
        let milestone_id = milestone.id;
        self.db.projects.mutate(project_id, move |p| {
            p.milestones.push(milestone_id);
            p.updated_at = now;
            Ok(())
        })?;

        self.notifier.notify_many(
            &project.doc.participant_ids(),
            NotificationType::MilestoneCreated,
            "New milestone",
            &format!("\"{}\" was added to \"{}\"", milestone.title, project.doc.title),
            NotificationRefs::project(project_id),
            caller.id,
        );

        Ok(milestone)
    }

    /// flag work as underway
    pub async fn start(&self, caller: &Caller, milestone_id: Uuid) -> CoreResult<Milestone> {
        let current = self.fetch(milestone_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth
            .authorize(caller, Action::SubmitMilestone, &project)?;

        match current.doc.state {
            MilestoneState::NotStarted { .. } => {}
            _ => {
                return Err(CoreError::Validation(format!(
                    "a {} milestone cannot be started",
                    current.doc.state.label()
                )))
            }
        }

        let mut updated = current.doc.clone();
        updated.state = MilestoneState::InProgress;
        updated.updated_at = self.clock.now();
        self.db
            .milestones
            .try_replace(milestone_id, current.version, updated.clone())?;
        Ok(updated)
    }

    /**
     * hand the milestone in for review
     * the link must match the project's canonical repository when one is set
     */
    pub async fn submit(
        &self,
        caller: &Caller,
        milestone_id: Uuid,
        github_link: &str,
        description: &str,
    ) -> CoreResult<Milestone> {
        let current = self.fetch(milestone_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth
            .authorize(caller, Action::SubmitMilestone, &project)?;

        let github_link = github_link.trim();
        let description = description.trim();
        if github_link.is_empty() || description.is_empty() {
            return Err(CoreError::Validation(
                "a repository link and a description are both required".into(),
            ));
        }
        if let Some(repo) = &project.github_repo {
            if !same_repo(repo, github_link) {
                return Err(CoreError::Validation(format!(
                    "the submission must point at the project repository {repo}"
                )));
            }
        }

        match current.doc.state {
            MilestoneState::NotStarted { .. } | MilestoneState::InProgress => {}
            MilestoneState::Submitted { .. } => {
                return Err(CoreError::Conflict(
                    "this milestone is already awaiting review".into(),
                ))
            }
            MilestoneState::Approved { .. } => {
                return Err(CoreError::Validation(
                    "an approved milestone cannot be resubmitted".into(),
                ))
            }
        }

        let now = self.clock.now();
        let mut updated = current.doc.clone();
        updated.state = MilestoneState::Submitted {
            submission: Submission {
                github_link: github_link.to_owned(),
                description: description.to_owned(),
                submitted_by: caller.id,
                submitted_at: now,
            },
        };
        updated.updated_at = now;
        self.db
            .milestones
            .try_replace(milestone_id, current.version, updated.clone())?;
        info!("milestone {} submitted by {}", milestone_id, caller.id);

        if let Some(mentor) = project.mentor {
            self.notifier.notify(
                mentor,
                NotificationType::MilestoneSubmitted,
                "Milestone submitted",
                &format!("\"{}\" is ready for review", updated.title),
                NotificationRefs::project(project.id),
                caller.id,
            );
        }

        Ok(updated)
    }

    /**
     * mentor or admin verdict on a submitted milestone
     * a rejection must carry notes and sends the milestone back to the
     * start with them attached, approval is terminal for the round
     */
    pub async fn review(
        &self,
        caller: &Caller,
        milestone_id: Uuid,
        verdict: ReviewVerdict,
        notes: &str,
    ) -> CoreResult<Milestone> {
        let current = self.fetch(milestone_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth
            .authorize(caller, Action::ReviewMilestone, &project)?;

        let submission = match &current.doc.state {
            MilestoneState::Submitted { submission } => submission.clone(),
            MilestoneState::Approved { .. } => {
                return Err(CoreError::Conflict(
                    "this milestone was already reviewed".into(),
                ))
            }
            _ => {
                return Err(CoreError::Validation(
                    "only a submitted milestone can be reviewed".into(),
                ))
            }
        };

        let notes = notes.trim();
        if verdict == ReviewVerdict::Reject && notes.is_empty() {
            return Err(CoreError::Validation(
                "a rejection must carry feedback notes".into(),
            ));
        }

        let now = self.clock.now();
        let review = Review {
            notes: notes.to_owned(),
            reviewed_by: caller.id,
            reviewed_at: now,
        };
        let submitter = submission.submitted_by;

        let mut updated = current.doc.clone();
        updated.state = match verdict {
            ReviewVerdict::Approve => MilestoneState::Approved { submission, review },
            ReviewVerdict::Reject => MilestoneState::NotStarted {
                rejection: Some(review),
            },
        };
        updated.updated_at = now;
        self.db
            .milestones
            .try_replace(milestone_id, current.version, updated.clone())?;

        let (kind, title) = match verdict {
            ReviewVerdict::Approve => (NotificationType::MilestoneApproved, "Milestone approved"),
            ReviewVerdict::Reject => (NotificationType::MilestoneRejected, "Milestone rejected"),
        };
        self.notifier.notify(
            submitter,
            kind,
            title,
            &format!("\"{}\": {}", updated.title, if notes.is_empty() { "approved" } else { notes }),
            NotificationRefs::project(project.id),
            caller.id,
        );

        Ok(updated)
    }

    /// replace the ordered checklist under a milestone
    pub async fn set_sub_milestones(
        &self,
        caller: &Caller,
        milestone_id: Uuid,
        titles: Vec<String>,
    ) -> CoreResult<Milestone> {
        let current = self.fetch(milestone_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth
            .authorize(caller, Action::CreateMilestone, &project)?;

        let now = self.clock.now();
        self.db.milestones.mutate(milestone_id, move |m| {
            m.sub_milestones = titles
                .into_iter()
                .map(|title| SubMilestone {
                    title,
                    completed: false,
                })
                .collect();
            m.updated_at = now;
            Ok(m.clone())
        })
    }

    pub async fn toggle_sub_milestone(
        &self,
        caller: &Caller,
        milestone_id: Uuid,
        index: usize,
        completed: bool,
    ) -> CoreResult<Milestone> {
        let current = self.fetch(milestone_id)?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth
            .authorize(caller, Action::SubmitMilestone, &project)?;

        let now = self.clock.now();
        self.db.milestones.mutate(milestone_id, move |m| {
            let item = m.sub_milestones.get_mut(index).ok_or_else(|| {
                CoreError::Validation(format!("no sub-milestone at position {index}"))
            })?;
            item.completed = completed;
            m.updated_at = now;
            Ok(m.clone())
        })
    }

    pub async fn get(&self, milestone_id: Uuid) -> CoreResult<Milestone> {
        Ok(self.fetch(milestone_id)?.doc)
    }

    /// milestones in the project's declared order
    pub async fn list_for_project(&self, project_id: Uuid) -> CoreResult<Vec<Milestone>> {
        let project = self.fetch_project(project_id)?;
        let mut out = Vec::with_capacity(project.milestones.len());
        for id in &project.milestones {
            if let Some(found) = self.db.milestones.get(*id) {
                out.push(found.doc);
            }
        }
        Ok(out)
    }

    fn fetch(&self, milestone_id: Uuid) -> CoreResult<crate::services::db::Versioned<Milestone>> {
        self.db
            .milestones
            .get(milestone_id)
            .ok_or_else(|| CoreError::NotFound("milestone not found".into()))
    }

    fn fetch_project(&self, project_id: Uuid) -> CoreResult<crate::models::project::Project> {
        self.db
            .projects
            .get(project_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_core;

    #[test]
    fn repo_comparison_ignores_case_and_trailing_slash() {
        assert!(same_repo("https://github.com/t/p/", "https://GitHub.com/T/P"));
        assert!(same_repo("https://github.com/t/p", "https://github.com/t/p/"));
        assert!(!same_repo("https://github.com/t/p", "https://github.com/t/q"));
    }

    #[tokio::test]
    async fn submit_requires_link_and_description() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;

        let err = t
            .core
            .milestones
            .submit(&owner, milestone.id, "", "done")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let err = t
            .core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/t/p", "  ")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn submission_link_is_checked_against_the_canonical_repo() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        t.core
            .projects
            .set_repository(&mentor, project.id, "https://github.com/t/p/")
            .await
            .unwrap();
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;

        // trailing slash and case differences are fine
        t.core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/T/P", "auth shipped")
            .await
            .unwrap();

        let other = t.milestone(&mentor, project.id, "payments").await;
        let err = t
            .core
            .milestones
            .submit(&owner, other.id, "https://github.com/t/q", "wrong repo")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn approval_only_from_submitted() {
        let t = test_core();
        let (project, mentor, _owner) = t.project_with_mentor().await;
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;

        let err = t
            .core
            .milestones
            .review(&mentor, milestone.id, ReviewVerdict::Approve, "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn rejection_needs_notes_and_preserves_them() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;
        t.core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/t/p", "first try")
            .await
            .unwrap();

        let err = t
            .core
            .milestones
            .review(&mentor, milestone.id, ReviewVerdict::Reject, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let rejected = t
            .core
            .milestones
            .review(&mentor, milestone.id, ReviewVerdict::Reject, "needs tests")
            .await
            .unwrap();
        match rejected.state {
            MilestoneState::NotStarted { rejection: Some(review) } => {
                assert_eq!(review.notes, "needs tests");
                assert_eq!(review.reviewed_by, mentor.id);
            }
            other => panic!("expected a rejected milestone, got {other:?}"),
        }

        // and the round can start over
        t.core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/t/p", "second try")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn students_cannot_review() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;
        t.core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/t/p", "done")
            .await
            .unwrap();

        let err = t
            .core
            .milestones
            .review(&owner, milestone.id, ReviewVerdict::Approve, "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn second_reviewer_loses_with_conflict() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let milestone = t.milestone(&mentor, project.id, "auth flow").await;
        t.core
            .milestones
            .submit(&owner, milestone.id, "https://github.com/t/p", "done")
            .await
            .unwrap();

        let admin = t.admin().await;
        let (first, second) = tokio::join!(
            t.core
                .milestones
                .review(&mentor, milestone.id, ReviewVerdict::Approve, "ship it"),
            t.core
                .milestones
                .review(&admin, milestone.id, ReviewVerdict::Approve, "fine by me"),
        );

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if first.is_err() { first } else { second };
        assert_eq!(loser.unwrap_err().code(), "CONFLICT");
    }
}
