use serde::{Deserialize, Serialize};

/// reference handed back by the object store once a blob is accepted
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub key: String,
    pub name: String,
    pub content_type: String,
    pub size: usize,
}
