use std::sync::Arc;

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, CoreResult};

use services::db::Database;
use services::meeting::MeetingService;
use services::milestone::MilestoneService;
use services::notification::{NotificationService, Notifier, StoreSink};
use services::project::ProjectService;
use services::sprint::SprintService;
use services::storage::FileStore;
use services::task::TaskService;
use services::team::TeamService;
use services::user::UserService;

/// Everything wired together. The transport layer constructs one of these
/// and calls straight into the services.
pub struct Core {
    pub db: Arc<Database>,
    pub config: Config,
    pub users: UserService,
    pub projects: ProjectService,
    pub team: Arc<TeamService>,
    pub milestones: MilestoneService,
    pub tasks: TaskService,
    pub sprints: SprintService,
    pub meetings: MeetingService,
    pub notifications: NotificationService,
}

impl Core {
    pub fn new(clock: Arc<dyn Clock>, files: Arc<dyn FileStore>, config: Config) -> Self {
        let db = Database::new();
        let notifier = Arc::new(Notifier::new(
            Arc::new(StoreSink::new(db.clone())),
            clock.clone(),
        ));
        let team = Arc::new(TeamService::new(db.clone(), notifier.clone(), clock.clone()));

        Self {
            users: UserService::new(db.clone(), team.clone(), clock.clone()),
            projects: ProjectService::new(db.clone(), notifier.clone(), clock.clone()),
            milestones: MilestoneService::new(db.clone(), notifier.clone(), clock.clone()),
            tasks: TaskService::new(
                db.clone(),
                notifier.clone(),
                files,
                config.clone(),
                clock.clone(),
            ),
            sprints: SprintService::new(db.clone(), clock.clone()),
            meetings: MeetingService::new(db.clone(), notifier, clock.clone()),
            notifications: NotificationService::new(db.clone(), clock),
            team,
            config,
            db,
        }
    }
}
