use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Priority;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub github_link: String,
    pub description: String,
    pub submitted_by: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub notes: String,
    pub reviewed_by: Uuid,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

/// workflow stage together with the data that stage carries, so a milestone
/// can never claim approval without holding the submission it approved
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status")]
pub enum MilestoneState {
    NotStarted {
        #[serde(skip_serializing_if = "Option::is_none")]
        rejection: Option<Review>,
    },
    InProgress,
    Submitted {
        submission: Submission,
    },
    Approved {
        submission: Submission,
        review: Review,
    },
}

impl MilestoneState {
    pub fn label(&self) -> &'static str {
        match self {
            MilestoneState::NotStarted { .. } => "NotStarted",
            MilestoneState::InProgress => "InProgress",
            MilestoneState::Submitted { .. } => "Submitted",
            MilestoneState::Approved { .. } => "Approved",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubMilestone {
    pub title: String,
    pub completed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    #[serde(flatten)]
    pub state: MilestoneState,
    pub sub_milestones: Vec<SubMilestone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
