use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectStatus {
    Planning,
    InProgress,
    AppComplete,
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Joined,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub status: MemberStatus,
    pub role: String,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    pub owner: Option<Uuid>,
    pub mentor: Option<Uuid>,
    pub created_by: Uuid,
    pub github_repo: Option<String>,
    pub requires_task_review: bool,
    pub milestones: Vec<Uuid>,
    pub team_members: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn member_by_email(&self, email: &str) -> Option<&TeamMember> {
        self.team_members
            .iter()
            .find(|member| member.email.eq_ignore_ascii_case(email))
    }

    pub fn is_joined_member(&self, user_id: Uuid) -> bool {
        self.team_members
            .iter()
            .any(|member| member.user_id == Some(user_id) && member.status == MemberStatus::Joined)
    }

    /// everyone with a stake in project-wide announcements: the student
    /// owner, the mentor and every joined team member, deduplicated
    pub fn participant_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        if let Some(owner) = self.owner {
            ids.push(owner);
        }
        if let Some(mentor) = self.mentor {
            if !ids.contains(&mentor) {
                ids.push(mentor);
            }
        }
        for member in &self.team_members {
            if member.status != MemberStatus::Joined {
                continue;
            }
            if let Some(user_id) = member.user_id {
                if !ids.contains(&user_id) {
                    ids.push(user_id);
                }
            }
        }
        ids
    }
}
