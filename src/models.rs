use serde::{Deserialize, Serialize};

pub mod file;
pub mod meeting;
pub mod milestone;
pub mod notification;
pub mod project;
pub mod sprint;
pub mod task;
pub mod user;

/// shared priority tag for milestones and tasks
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}
