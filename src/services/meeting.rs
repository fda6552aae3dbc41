use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::meeting::{Meeting, MeetingStatus, Participant, ParticipantStatus};
use crate::models::notification::NotificationType;
use crate::models::project::MemberStatus;
use crate::models::user::Caller;
use crate::services::auth::{Action, AuthGate};
use crate::services::db::Database;
use crate::services::notification::{NotificationRefs, Notifier};

pub struct ScheduleMeetingInput {
    pub title: String,
    pub description: String,
    pub meeting_link: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// Synchronous meetings: invitation, joining and status tracking.
pub struct MeetingService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    auth: AuthGate,
    clock: Arc<dyn Clock>,
}

impl MeetingService {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            notifier,
            auth: AuthGate,
            clock,
        }
    }

    /**
     * schedule a meeting, mentor only
     * the invite list is the student owner plus everyone joined at this
     * moment, people added to the team later are not pulled in
     */
    pub async fn create(
        &self,
        caller: &Caller,
        project_id: Uuid,
        input: ScheduleMeetingInput,
    ) -> CoreResult<Meeting> {
        let project = self
            .db
            .projects
            .get(project_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth.authorize(caller, Action::CreateMeeting, &project)?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("a meeting title is required".into()));
        }
        if input.duration_minutes == 0 {
            return Err(CoreError::Validation(
                "the meeting needs a positive duration".into(),
            ));
        }

        let mut invitees: Vec<Uuid> = Vec::new();
        if let Some(owner) = project.owner {
            invitees.push(owner);
        }
        for member in &project.team_members {
            if member.status != MemberStatus::Joined {
                continue;
            }
            if let Some(user_id) = member.user_id {
                if user_id != caller.id && !invitees.contains(&user_id) {
                    invitees.push(user_id);
                }
            }
        }

        let now = self.clock.now();
        let participants = invitees
            .iter()
            .map(|&user_id| Participant {
                user_id,
                name: self
                    .db
                    .users
                    .get(user_id)
                    .map(|u| u.doc.name)
                    .unwrap_or_default(),
                status: ParticipantStatus::Invited,
                joined_at: None,
            })
            .collect();

        let meeting = Meeting {
            id: Uuid::new_v4(),
            project_id,
            title: title.to_owned(),
            description: input.description.trim().to_owned(),
            meeting_link: input.meeting_link,
            created_by: caller.id,
            mentor: caller.id,
            scheduled_at: input.scheduled_at,
            duration_minutes: input.duration_minutes,
            status: MeetingStatus::Scheduled,
            participants,
            created_at: now,
            updated_at: now,
        };
        self.db.meetings.insert(meeting.id, meeting.clone());
        info!("meeting {} scheduled on project {}", meeting.id, project_id);

        self.notifier.notify_many(
            &invitees,
            NotificationType::MeetingScheduled,
            "Meeting scheduled",
            &format!("\"{}\" on {}", meeting.title, meeting.scheduled_at),
            NotificationRefs::meeting(project_id, meeting.id),
            caller.id,
        );

        Ok(meeting)
    }

    /**
     * mark the caller present
     * once the last invitee is in, a scheduled meeting flips to ongoing on
     * its own
     */
    pub async fn join(&self, caller: &Caller, meeting_id: Uuid) -> CoreResult<Meeting> {
        let current = self
            .db
            .meetings
            .get(meeting_id)
            .ok_or_else(|| CoreError::NotFound("meeting not found".into()))?;

        let is_mentor = caller.id == current.doc.mentor;
        let participant = current
            .doc
            .participants
            .iter()
            .find(|p| p.user_id == caller.id);
        if participant.is_none() && !is_mentor {
            return Err(CoreError::Forbidden(
                "only invited participants can join this meeting".into(),
            ));
        }

        // joining again is a no-op
        if let Some(p) = participant {
            if p.has_joined() {
                return Ok(current.doc);
            }
        }

        let now = self.clock.now();
        let caller_id = caller.id;
        let (updated, became_ongoing) = self.db.meetings.mutate(meeting_id, move |m| {
            if let Some(p) = m.participants.iter_mut().find(|p| p.user_id == caller_id) {
                if !p.has_joined() {
                    p.status = ParticipantStatus::Joined;
                    p.joined_at = Some(now);
                }
            }
            let all_in = m.participants.iter().all(|p| p.has_joined());
            let became_ongoing = m.status == MeetingStatus::Scheduled && all_in;
            if became_ongoing {
                m.status = MeetingStatus::Ongoing;
            }
            m.updated_at = now;
            Ok((m.clone(), became_ongoing))
        })?;

        if became_ongoing {
            let recipients: Vec<Uuid> = updated.participants.iter().map(|p| p.user_id).collect();
            self.notifier.notify_many(
                &recipients,
                NotificationType::MeetingStatusChanged,
                "Meeting started",
                &format!("\"{}\" is now ongoing", updated.title),
                NotificationRefs::meeting(updated.project_id, updated.id),
                caller.id,
            );
        }

        Ok(updated)
    }

    /**
     * creator or mentor set the status by hand, in either direction, since
     * a mis-set status sometimes needs walking back
     */
    pub async fn update_status(
        &self,
        caller: &Caller,
        meeting_id: Uuid,
        status: MeetingStatus,
    ) -> CoreResult<Meeting> {
        let current = self
            .db
            .meetings
            .get(meeting_id)
            .ok_or_else(|| CoreError::NotFound("meeting not found".into()))?;
        if caller.id != current.doc.created_by && caller.id != current.doc.mentor {
            return Err(CoreError::Forbidden(
                "only the meeting creator or the mentor can change its status".into(),
            ));
        }

        let mut updated = current.doc.clone();
        updated.status = status;
        updated.updated_at = self.clock.now();
        self.db
            .meetings
            .try_replace(meeting_id, current.version, updated.clone())?;

        let recipients: Vec<Uuid> = updated.participants.iter().map(|p| p.user_id).collect();
        self.notifier.notify_many(
            &recipients,
            NotificationType::MeetingStatusChanged,
            "Meeting status changed",
            &format!("\"{}\" is now {:?}", updated.title, updated.status),
            NotificationRefs::meeting(updated.project_id, updated.id),
            caller.id,
        );

        Ok(updated)
    }

    pub async fn delete(&self, caller: &Caller, meeting_id: Uuid) -> CoreResult<()> {
        let current = self
            .db
            .meetings
            .get(meeting_id)
            .ok_or_else(|| CoreError::NotFound("meeting not found".into()))?;
        self.auth
            .require_creator(caller, current.doc.created_by, "meeting")?;
        self.db.meetings.remove(meeting_id);
        Ok(())
    }

    pub async fn get(&self, meeting_id: Uuid) -> CoreResult<Meeting> {
        self.db
            .meetings
            .get(meeting_id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("meeting not found".into()))
    }

    pub async fn list_for_project(&self, project_id: Uuid) -> Vec<Meeting> {
        let mut out = self.db.meetings.find(|m| m.project_id == project_id);
        out.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::testutil::test_core;
    use chrono::TimeZone;

    #[tokio::test]
    async fn only_the_mentor_schedules() {
        let t = test_core();
        let (project, _mentor, owner) = t.project_with_mentor().await;

        let err = t
            .core
            .meetings
            .create(
                &owner,
                project.id,
                ScheduleMeetingInput {
                    title: "standup".into(),
                    description: String::new(),
                    meeting_link: None,
                    scheduled_at: Utc.with_ymd_and_hms(2026, 1, 6, 10, 0, 0).unwrap(),
                    duration_minutes: 30,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn later_team_members_are_not_retroactively_invited() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let meeting = t.meeting(&mentor, project.id, "kickoff").await;
        assert_eq!(meeting.participants.len(), 1);
        assert_eq!(meeting.participants[0].user_id, owner.id);

        t.register_student("Late", "late@x.com").await;
        t.core
            .team
            .add_member(&mentor, project.id, "", "late@x.com", "backend")
            .await
            .unwrap();

        let unchanged = t.core.meetings.get(meeting.id).await.unwrap();
        assert_eq!(unchanged.participants.len(), 1);
    }

    #[tokio::test]
    async fn meeting_goes_ongoing_when_the_last_invitee_joins() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let second = t.register_student("Bo", "bo@x.com").await;
        let third = t.register_student("Cy", "cy@x.com").await;
        t.core
            .team
            .add_member(&mentor, project.id, "", "bo@x.com", "backend")
            .await
            .unwrap();
        t.core
            .team
            .add_member(&mentor, project.id, "", "cy@x.com", "frontend")
            .await
            .unwrap();

        let meeting = t.meeting(&mentor, project.id, "retro").await;
        assert_eq!(meeting.participants.len(), 3);

        let bo = Caller::new(second.id, Role::Student);
        let cy = Caller::new(third.id, Role::Student);

        let after_one = t.core.meetings.join(&owner, meeting.id).await.unwrap();
        assert_eq!(after_one.status, MeetingStatus::Scheduled);
        let after_two = t.core.meetings.join(&bo, meeting.id).await.unwrap();
        assert_eq!(after_two.status, MeetingStatus::Scheduled);

        // re-joining is a no-op and does not advance anything
        let rejoin = t.core.meetings.join(&bo, meeting.id).await.unwrap();
        assert_eq!(rejoin.status, MeetingStatus::Scheduled);

        let after_three = t.core.meetings.join(&cy, meeting.id).await.unwrap();
        assert_eq!(after_three.status, MeetingStatus::Ongoing);
    }

    #[tokio::test]
    async fn uninvited_callers_cannot_join() {
        let t = test_core();
        let (project, mentor, _owner) = t.project_with_mentor().await;
        let meeting = t.meeting(&mentor, project.id, "sync").await;

        let stranger = t.student("Sid", "sid@x.com").await;
        let err = t
            .core
            .meetings
            .join(&stranger, meeting.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        // the mentor can always come in
        t.core.meetings.join(&mentor, meeting.id).await.unwrap();
    }

    #[tokio::test]
    async fn status_can_be_walked_back_by_the_creator() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let meeting = t.meeting(&mentor, project.id, "demo").await;

        let done = t
            .core
            .meetings
            .update_status(&mentor, meeting.id, MeetingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, MeetingStatus::Completed);

        let back = t
            .core
            .meetings
            .update_status(&mentor, meeting.id, MeetingStatus::Scheduled)
            .await
            .unwrap();
        assert_eq!(back.status, MeetingStatus::Scheduled);

        let err = t
            .core
            .meetings
            .update_status(&owner, meeting.id, MeetingStatus::Cancelled)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn only_the_creator_deletes() {
        let t = test_core();
        let (project, mentor, owner) = t.project_with_mentor().await;
        let meeting = t.meeting(&mentor, project.id, "one-off").await;

        let err = t.core.meetings.delete(&owner, meeting.id).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        t.core.meetings.delete(&mentor, meeting.id).await.unwrap();
        assert_eq!(
            t.core.meetings.get(meeting.id).await.unwrap_err().code(),
            "NOT_FOUND"
        );
    }
}
