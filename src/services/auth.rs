use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::project::Project;
use crate::models::user::{Caller, Role};

/// operations a caller can be checked against a project for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    ManageTeam,
    UpdateProject,
    AssignMentor,
    CreateMilestone,
    SubmitMilestone,
    ReviewMilestone,
    EditTask,
    ReviewTask,
    CreateSprint,
    CreateMeeting,
    ViewProject,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::ManageTeam => "managing the team",
            Action::UpdateProject => "updating the project",
            Action::AssignMentor => "assigning a mentor",
            Action::CreateMilestone => "creating milestones",
            Action::SubmitMilestone => "submitting milestones",
            Action::ReviewMilestone => "reviewing milestones",
            Action::EditTask => "editing tasks",
            Action::ReviewTask => "reviewing tasks",
            Action::CreateSprint => "creating sprints",
            Action::CreateMeeting => "scheduling meetings",
            Action::ViewProject => "viewing project activity",
        }
    }
}

/// Role-and-relationship gate. A denial is a normal return carrying the
/// reason, never a panic.
#[derive(Clone, Copy, Default)]
pub struct AuthGate;

impl AuthGate {
    pub fn authorize(&self, caller: &Caller, action: Action, project: &Project) -> CoreResult<()> {
        let allowed = match action {
            Action::AssignMentor => caller.role == Role::Admin,
            // meetings are called by the mentor who actually runs the project
            Action::CreateMeeting => {
                caller.role == Role::Mentor && project.mentor == Some(caller.id)
            }
            Action::CreateMilestone
            | Action::ReviewMilestone
            | Action::ReviewTask
            | Action::CreateSprint => self.is_staff(caller, project),
            Action::ManageTeam | Action::UpdateProject => {
                self.is_staff(caller, project) || project.owner == Some(caller.id)
            }
            Action::SubmitMilestone | Action::EditTask => self.has_team_access(caller, project),
            Action::ViewProject => {
                self.has_team_access(caller, project) || project.created_by == caller.id
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "caller is not permitted {} on project \"{}\"",
                action.label(),
                project.title
            )))
        }
    }

    /// only the entity's creator may act
    pub fn require_creator(&self, caller: &Caller, created_by: Uuid, what: &str) -> CoreResult<()> {
        if caller.id == created_by {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "only the creator of this {what} may do this"
            )))
        }
    }

    pub fn is_staff(&self, caller: &Caller, project: &Project) -> bool {
        caller.role == Role::Admin
            || (caller.role == Role::Mentor && project.mentor == Some(caller.id))
    }

    fn has_team_access(&self, caller: &Caller, project: &Project) -> bool {
        self.is_staff(caller, project)
            || project.owner == Some(caller.id)
            || project.is_joined_member(caller.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{MemberStatus, ProjectStatus, TeamMember};
    use chrono::{TimeZone, Utc};

    fn project(owner: Option<Uuid>, mentor: Option<Uuid>) -> Project {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Project {
            id: Uuid::new_v4(),
            title: "capstone".into(),
            description: String::new(),
            status: ProjectStatus::Planning,
            owner,
            mentor,
            created_by: owner.unwrap_or_else(Uuid::new_v4),
            github_repo: None,
            requires_task_review: false,
            milestones: vec![],
            team_members: vec![],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn only_the_assigned_mentor_schedules_meetings() {
        let mentor = Uuid::new_v4();
        let project = project(None, Some(mentor));
        let gate = AuthGate;

        let ok = Caller::new(mentor, Role::Mentor);
        assert!(gate.authorize(&ok, Action::CreateMeeting, &project).is_ok());

        // a different mentor is denied even with the right role
        let other = Caller::new(Uuid::new_v4(), Role::Mentor);
        let err = gate
            .authorize(&other, Action::CreateMeeting, &project)
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        // and so is an admin: meetings belong to the mentor who runs them
        let admin = Caller::new(Uuid::new_v4(), Role::Admin);
        assert!(gate
            .authorize(&admin, Action::CreateMeeting, &project)
            .is_err());
    }

    #[test]
    fn review_is_staff_only() {
        let mentor = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let project = project(Some(owner), Some(mentor));
        let gate = AuthGate;

        assert!(gate
            .authorize(
                &Caller::new(mentor, Role::Mentor),
                Action::ReviewMilestone,
                &project
            )
            .is_ok());
        assert!(gate
            .authorize(
                &Caller::new(Uuid::new_v4(), Role::Admin),
                Action::ReviewMilestone,
                &project
            )
            .is_ok());

        let err = gate
            .authorize(
                &Caller::new(owner, Role::Student),
                Action::ReviewMilestone,
                &project
            )
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn joined_members_get_team_access_pending_ones_do_not() {
        let joined = Uuid::new_v4();
        let mut project = project(None, None);
        project.team_members.push(TeamMember {
            name: "ana".into(),
            email: "ana@x.com".into(),
            user_id: Some(joined),
            status: MemberStatus::Joined,
            role: "frontend".into(),
            joined_at: None,
        });
        project.team_members.push(TeamMember {
            name: "ben".into(),
            email: "ben@x.com".into(),
            user_id: None,
            status: MemberStatus::Pending,
            role: "backend".into(),
            joined_at: None,
        });

        let gate = AuthGate;
        assert!(gate
            .authorize(&Caller::new(joined, Role::Student), Action::EditTask, &project)
            .is_ok());
        assert!(gate
            .authorize(
                &Caller::new(Uuid::new_v4(), Role::Student),
                Action::EditTask,
                &project
            )
            .is_err());
    }
}
