use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ExecutionFailure;

/// Stores bytes and hands back a public URL.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<String, ExecutionFailure>;
}

/// Object key for an upload: `ai-ads-gen/<content-type>/<file name>`.
pub fn object_key(file_name: &str, content_type: &str) -> String {
    format!("ai-ads-gen/{}/{file_name}", content_type.replace('/', "-"))
}

/// Writes objects under a local root that is served at `public_base_url`.
pub struct FsObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<String, ExecutionFailure> {
        if file_name.contains('/') || file_name.contains("..") {
            return Err(ExecutionFailure::Upload(format!("invalid file name: {file_name}")));
        }
        let key = object_key(file_name, content_type);
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExecutionFailure::Upload(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ExecutionFailure::Upload(e.to_string()))?;
        Ok(format!("{}/{key}", self.public_base_url))
    }
}
