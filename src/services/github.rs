use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RepoCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RepoBranch {
    pub name: String,
    pub head_sha: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RepoPullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RepoContributor {
    pub login: String,
    pub contributions: u64,
}

/// Read-only window onto the project's linked repository. Implemented
/// outside the core against the real hosting API; the core never holds an
/// HTTP client or an API token.
#[async_trait]
pub trait SourceHostClient: Send + Sync {
    async fn commits(&self, repo: &str) -> anyhow::Result<Vec<RepoCommit>>;
    async fn branches(&self, repo: &str) -> anyhow::Result<Vec<RepoBranch>>;
    async fn pull_requests(&self, repo: &str) -> anyhow::Result<Vec<RepoPullRequest>>;
    async fn contributors(&self, repo: &str) -> anyhow::Result<Vec<RepoContributor>>;
}

/// snapshot composed for the project activity view
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RepoActivity {
    pub repo: String,
    pub commits: Vec<RepoCommit>,
    pub branches: Vec<RepoBranch>,
    pub pull_requests: Vec<RepoPullRequest>,
    pub contributors: Vec<RepoContributor>,
}
