use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    TeamInvite,
    MemberJoined,
    MentorAssigned,
    ProjectStatusChanged,
    MilestoneCreated,
    MilestoneSubmitted,
    MilestoneApproved,
    MilestoneRejected,
    TaskAssigned,
    TaskSubmitted,
    TaskApproved,
    TaskRejected,
    MeetingScheduled,
    MeetingStatusChanged,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub project_id: Option<Uuid>,
    pub meeting_id: Option<Uuid>,
    pub created_by: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
