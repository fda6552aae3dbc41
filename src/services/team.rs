use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::notification::NotificationType;
use crate::models::project::{MemberStatus, TeamMember};
use crate::models::user::{Caller, User};
use crate::services::auth::{Action, AuthGate};
use crate::services::db::Database;
use crate::services::notification::{NotificationRefs, Notifier};
use crate::services::user::normalize_email;

/// Reconciles invited-by-email team members against registered accounts.
pub struct TeamService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    auth: AuthGate,
    clock: Arc<dyn Clock>,
}

impl TeamService {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            notifier,
            auth: AuthGate,
            clock,
        }
    }

    /**
     * invite someone onto the team by email
     * an already-registered email joins immediately, anyone else stays
     * pending until they register or claim the spot
     */
    pub async fn add_member(
        &self,
        caller: &Caller,
        project_id: Uuid,
        name: &str,
        email: &str,
        role_tag: &str,
    ) -> CoreResult<TeamMember> {
        let email = normalize_email(email)?;
        let project = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth.authorize(caller, Action::ManageTeam, &project.doc)?;

        let registered = self
            .db
            .users
            .find(|u| u.email.eq_ignore_ascii_case(&email))
            .into_iter()
            .next();

        let now = self.clock.now();
        let member = match &registered {
            Some(user) => TeamMember {
                name: if name.trim().is_empty() {
                    user.name.clone()
                } else {
                    name.trim().to_owned()
                },
                email: email.clone(),
                user_id: Some(user.id),
                status: MemberStatus::Joined,
                role: role_tag.trim().to_owned(),
                joined_at: Some(now),
            },
            None => TeamMember {
                name: name.trim().to_owned(),
                email: email.clone(),
                user_id: None,
                status: MemberStatus::Pending,
                role: role_tag.trim().to_owned(),
                joined_at: None,
            },
        };

        // uniqueness check and insert happen under the project row lock so a
        // racing duplicate add lands on Conflict instead of overwriting
        let inserted = member.clone();
        self.db.projects.mutate(project_id, move |p| {
            if p.member_by_email(&email).is_some() {
                return Err(CoreError::Conflict(format!(
                    "{email} is already on the team"
                )));
            }
            p.team_members.push(inserted);
            p.updated_at = now;
            Ok(())
        })?;

        if let Some(user) = registered {
            self.notifier.notify(
                user.id,
                NotificationType::TeamInvite,
                "Added to a project team",
                &format!("You were added to the team of \"{}\"", project.doc.title),
                NotificationRefs::project(project_id),
                caller.id,
            );
        }

        Ok(member)
    }

    /**
     * called once right after an account is created
     * flips every pending invitation matching the new email to joined,
     * binding the account id. safe to call again, already-joined entries
     * are left alone
     */
    pub async fn reconcile_on_registration(&self, user: &User) {
        let email = user.email.clone();
        let invited = self.db.projects.find(|p| {
            p.member_by_email(&email)
                .map_or(false, |m| m.status == MemberStatus::Pending)
        });

        for project in invited {
            let now = self.clock.now();
            let user_id = user.id;
            let email = email.clone();
            let flipped = self.db.projects.mutate(project.id, move |p| {
                let member = p
                    .team_members
                    .iter_mut()
                    .find(|m| m.email.eq_ignore_ascii_case(&email));
                match member {
                    Some(m) if m.status == MemberStatus::Pending => {
                        m.user_id = Some(user_id);
                        m.status = MemberStatus::Joined;
                        m.joined_at = Some(now);
                        p.updated_at = now;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            });

            if let Ok(true) = flipped {
                info!(
                    "pending invitation on project {} honoured for {}",
                    project.id, user.email
                );
                if let Some(mentor) = project.mentor {
                    self.notifier.notify(
                        mentor,
                        NotificationType::MemberJoined,
                        "Team member joined",
                        &format!("{} joined \"{}\"", user.name, project.title),
                        NotificationRefs::project(project.id),
                        user.id,
                    );
                }
            }
        }
    }

    /**
     * an invited user takes their own pending spot
     */
    pub async fn claim_membership(&self, caller: &Caller, project_id: Uuid) -> CoreResult<TeamMember> {
        let user = self
            .db
            .users
            .get(caller.id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("no account for caller".into()))?;

        let now = self.clock.now();
        let user_id = user.id;
        let email = user.email.clone();
        let claimed = self.db.projects.mutate(project_id, move |p| {
            let member = p
                .team_members
                .iter_mut()
                .find(|m| m.email.eq_ignore_ascii_case(&email));
            match member {
                None => Err(CoreError::NotFound(format!(
                    "{email} has not been invited to this project"
                ))),
                Some(m) if m.status == MemberStatus::Joined => Err(CoreError::Conflict(
                    "this membership is already claimed".into(),
                )),
                Some(m) => {
                    m.user_id = Some(user_id);
                    m.status = MemberStatus::Joined;
                    m.joined_at = Some(now);
                    let claimed = m.clone();
                    p.updated_at = now;
                    Ok(claimed)
                }
            }
        })?;

        let project = self.db.projects.get(project_id).map(|v| v.doc);
        if let Some(mentor) = project.as_ref().and_then(|p| p.mentor) {
            self.notifier.notify(
                mentor,
                NotificationType::MemberJoined,
                "Team member joined",
                &format!(
                    "{} joined \"{}\"",
                    user.name,
                    project.as_ref().map(|p| p.title.as_str()).unwrap_or("")
                ),
                NotificationRefs::project(project_id),
                user.id,
            );
        }

        Ok(claimed)
    }

    /**
     * drop a member from the team
     * historical task assignments are deliberately left alone, a dangling
     * assignee reads as unassigned
     */
    pub async fn remove_member(&self, caller: &Caller, project_id: Uuid, email: &str) -> CoreResult<()> {
        let email = normalize_email(email)?;
        let project = self
            .db
            .projects
            .get(project_id)
            .ok_or_else(|| CoreError::NotFound("project not found".into()))?;
        self.auth.authorize(caller, Action::ManageTeam, &project.doc)?;

        let now = self.clock.now();
        self.db.projects.mutate(project_id, move |p| {
            let before = p.team_members.len();
            p.team_members
                .retain(|m| !m.email.eq_ignore_ascii_case(&email));
            if p.team_members.len() == before {
                return Err(CoreError::NotFound(format!(
                    "{email} is not on the team"
                )));
            }
            p.updated_at = now;
            Ok(())
        })
    }
}
