use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::user::{Role, User};
use crate::services::db::Database;
use crate::services::team::TeamService;

/// lowercase, trimmed form every email is stored and compared in
pub(crate) fn normalize_email(email: &str) -> CoreResult<String> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::Validation(
            "a valid email address is required".into(),
        ));
    }
    Ok(email)
}

pub struct UserService {
    db: Arc<Database>,
    team: Arc<TeamService>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(db: Arc<Database>, team: Arc<TeamService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, team, clock }
    }

    /**
     * create an account once the identity collaborator finishes a signup
     * any team invitation sent to this email before the account existed is
     * honoured right away
     */
    pub async fn register(&self, name: &str, email: &str, role: Role) -> CoreResult<User> {
        let email = normalize_email(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("a name is required".into()));
        }

        if !self
            .db
            .users
            .find(|u| u.email.eq_ignore_ascii_case(&email))
            .is_empty()
        {
            return Err(CoreError::Conflict(format!(
                "an account already exists for {email}"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email,
            role,
            created_at: self.clock.now(),
        };
        self.db.users.insert(user.id, user.clone());
        info!("registered account {} ({})", user.id, user.email);

        self.team.reconcile_on_registration(&user).await;

        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<User> {
        self.db
            .users
            .get(id)
            .map(|v| v.doc)
            .ok_or_else(|| CoreError::NotFound("user not found".into()))
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.db
            .users
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .into_iter()
            .next()
    }
}
