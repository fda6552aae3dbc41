use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::file::StoredFile;

/// a blob handed over for storage after it passed validation
#[derive(Clone, Debug)]
pub struct Upload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object storage collaborator. The production implementation lives outside
/// the core and talks to a real bucket; the core only sees this seam.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, upload: Upload) -> anyhow::Result<StoredFile>;
}

/// in-memory store used by tests
#[derive(Default)]
pub struct MemoryFileStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// how many blobs were actually accepted
    pub fn stored_count(&self) -> usize {
        self.blobs.len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, upload: Upload) -> anyhow::Result<StoredFile> {
        let key = format!("uploads/{}/{}", Uuid::new_v4(), upload.name);
        let size = upload.bytes.len();
        self.blobs.insert(key.clone(), upload.bytes);
        Ok(StoredFile {
            key,
            name: upload.name,
            content_type: upload.content_type,
            size,
        })
    }
}
