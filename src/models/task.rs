use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::StoredFile;
use super::Priority;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// proof-of-work attached to a submission round
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskProof {
    pub github_link: String,
    pub screenshots: Vec<StoredFile>,
    pub submitted_at: DateTime<Utc>,
}

/// review sub-state, tracked apart from the workflow stage so proof can
/// cycle through review rounds while the task stays visibly in progress
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskSubmission {
    None,
    PendingReview {
        proof: TaskProof,
    },
    Rejected {
        proof: TaskProof,
        #[serde(rename = "rejectedAt")]
        rejected_at: DateTime<Utc>,
    },
    Approved {
        proof: TaskProof,
        #[serde(rename = "approvedAt")]
        approved_at: DateTime<Utc>,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub sprint_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub assignee: Option<Uuid>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub story_points: u32,
    pub submission: TaskSubmission,
    pub is_verified: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
