use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::project::Project;
use crate::models::sprint::{Sprint, SprintStatus};
use crate::models::task::{Task, TaskStatus};
use crate::models::user::Caller;
use crate::services::auth::{Action, AuthGate};
use crate::services::db::Database;

pub struct CreateSprintInput {
    pub name: String,
    pub goal: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub ideal: f64,
    pub actual: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BurndownReport {
    pub points: Vec<BurndownPoint>,
    pub total_points: u32,
    pub secured_points: u32,
}

/// Groups tasks into time boxes and derives the secured-points series.
pub struct SprintService {
    db: Arc<Database>,
    auth: AuthGate,
    clock: Arc<dyn Clock>,
}

impl SprintService {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            auth: AuthGate,
            clock,
        }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        project_id: Uuid,
        input: CreateSprintInput,
    ) -> CoreResult<Sprint> {
        let project = self.fetch_project(project_id)?;
        self.auth.authorize(caller, Action::CreateSprint, &project)?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("a sprint name is required".into()));
        }
        if input.end_date <= input.start_date {
            return Err(CoreError::Validation(
                "the sprint must end after it starts".into(),
            ));
        }

        let now = self.clock.now();
        let sprint = Sprint {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_owned(),
            goal: input.goal.trim().to_owned(),
            start_date: input.start_date,
            end_date: input.end_date,
            status: SprintStatus::Planned,
            created_at: now,
            updated_at: now,
        };
        self.db.sprints.insert(sprint.id, sprint.clone());
        Ok(sprint)
    }

    pub async fn update_status(
        &self,
        caller: &Caller,
        sprint_id: Uuid,
        status: SprintStatus,
    ) -> CoreResult<Sprint> {
        let current = self
            .db
            .sprints
            .get(sprint_id)
            .ok_or_else(|| CoreError::NotFound("sprint not found".into()))?;
        let project = self.fetch_project(current.doc.project_id)?;
        self.auth.authorize(caller, Action::CreateSprint, &project)?;

        let mut updated = current.doc.clone();
        updated.status = status;
        updated.updated_at = self.clock.now();
        self.db
            .sprints
            .try_replace(sprint_id, current.version, updated.clone())?;
        Ok(updated)
    }

    /// pull an existing task into the time box
    pub async fn assign_task(&self, caller: &Caller, sprint_id: Uuid, task_id: Uuid) -> CoreResult<Task> {
        let sprint = self
            .db
            .sprints
            .get(sprint_id)
            .ok_or_else(|| CoreError::NotFound("sprint not found".into()))?;
        let task = self
            .db
            .tasks
            .get(task_id)
            .ok_or_else(|| CoreError::NotFound("task not found".into()))?;
        if sprint.doc.project_id != task.doc.project_id {
            return Err(CoreError::Validation(
                "the task belongs to a different project".into(),
            ));
        }
        let project = self.fetch_project(sprint.doc.project_id)?;
        self.auth.authorize(caller, Action::EditTask, &project)?;

        let now = self.clock.now();
        let mut updated = task.doc.clone();
        updated.sprint_id = Some(sprint_id);
        updated.updated_at = now;
        self.db
            .tasks
            .try_replace(task_id, task.version, updated.clone())?;
        Ok(updated)
    }

    pub async fn get(&self, sprint_id: Uuid) -> CoreResult<Sprint> {
        self.db
            .sprints
            .get(sprint_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("sprint not found".into()))
    }

    pub async fn list_for_project(&self, project_id: Uuid) -> Vec<Sprint> {
        let mut out = self.db.sprints.find(|s| s.project_id == project_id);
        out.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        out
    }

    /**
     * ideal-vs-actual series for the sprint
     * totals are computed from the live task list at query time, so scope
     * added mid-sprint shows up as a jump rather than being smoothed away
     */
    pub async fn compute_burndown(&self, sprint_id: Uuid) -> CoreResult<BurndownReport> {
        let sprint = self.get(sprint_id).await?;
        let project = self.fetch_project(sprint.project_id)?;
        let tasks = self.db.tasks.find(|t| t.sprint_id == Some(sprint_id));

        let total_points: u32 = tasks.iter().map(|t| t.story_points).sum();
        let secured_points: u32 = tasks
            .iter()
            .filter(|t| Self::is_secured(t, &project))
            .map(|t| t.story_points)
            .sum();

        let start = sprint.start_date.date_naive();
        let end = sprint.end_date.date_naive();
        let span = (end - start).num_days().max(0);

        let mut points = Vec::with_capacity(span as usize + 1);
        for offset in 0..=span {
            let date = start + Duration::days(offset);
            let ideal = if span == 0 {
                total_points as f64
            } else {
                total_points as f64 * offset as f64 / span as f64
            };
            let actual = tasks
                .iter()
                .filter(|t| {
                    t.completed_at
                        .map_or(false, |done| done.date_naive() <= date)
                })
                .map(|t| t.story_points)
                .sum();
            points.push(BurndownPoint {
                date,
                ideal,
                actual,
            });
        }

        Ok(BurndownReport {
            points,
            total_points,
            secured_points,
        })
    }

    /// completed counts, and verified where the project gates pointed work
    fn is_secured(task: &Task, project: &Project) -> bool {
        if task.status != TaskStatus::Completed {
            return false;
        }
        if project.requires_task_review && task.story_points > 0 {
            return task.is_verified;
        }
        true
    }

    fn fetch_project(&self, project_id: Uuid) -> CoreResult<Project> {
        self.db
            .projects
            .get(project_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))
    }
}
