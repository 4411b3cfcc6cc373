//! Generated-image row store shared between employees of one user.
//!
//! AdCreator inserts rows, QAReviewer flips the `evaluated` flag, Copywriter
//! attaches copy and AdLauncher records the published ad id. Rows are keyed
//! by `(user_id, id)`.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AdcrewError, ExecutionFailure};

/// Ad copy attached to an approved image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCopy {
    pub primary_text: String,
    pub headline: String,
    pub description: String,
    #[serde(default)]
    pub call_to_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub user_id: String,
    pub image_url: String,
    pub evaluated: bool,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub copy: Option<AdCopy>,
    #[serde(default)]
    pub ad_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row store for generated images.
///
/// Implementations are shared by every concurrently running user dispatch
/// and must synchronise internally.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn insert_image(&self, user_id: &str, image_url: &str)
    -> Result<ImageRecord, ExecutionFailure>;

    async fn unevaluated(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure>;

    async fn mark_evaluated(
        &self,
        id: u64,
        approved: bool,
        review: &str,
    ) -> Result<(), ExecutionFailure>;

    /// Approved images that have no copy yet.
    async fn awaiting_copy(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure>;

    async fn attach_copy(&self, id: u64, copy: AdCopy) -> Result<(), ExecutionFailure>;

    /// Approved images with copy that were never launched.
    async fn ready_to_launch(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure>;

    async fn mark_launched(&self, id: u64, ad_id: &str) -> Result<(), ExecutionFailure>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    rows: Vec<ImageRecord>,
}

/// In-process [`ImageStore`] guarded by an async mutex, with optional JSON
/// snapshot persistence between batch runs.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    state: Mutex<Snapshot>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot written by [`save`](Self::save). A missing file
    /// yields an empty store.
    pub async fn load(path: &Path) -> Result<Self, AdcrewError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::new());
        }
        let contents = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        Ok(Self {
            state: Mutex::new(snapshot),
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), AdcrewError> {
        let json = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&*state)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn records(&self, user_id: &str) -> Vec<ImageRecord> {
        self.select(user_id, |_| true).await
    }

    async fn select(&self, user_id: &str, keep: impl Fn(&ImageRecord) -> bool) -> Vec<ImageRecord> {
        let state = self.state.lock().await;
        state
            .rows
            .iter()
            .filter(|r| r.user_id == user_id && keep(r))
            .cloned()
            .collect()
    }

    async fn update(
        &self,
        id: u64,
        apply: impl FnOnce(&mut ImageRecord),
    ) -> Result<(), ExecutionFailure> {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ExecutionFailure::Store(format!("image {id} not found")))?;
        apply(row);
        row.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn insert_image(
        &self,
        user_id: &str,
        image_url: &str,
    ) -> Result<ImageRecord, ExecutionFailure> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let now = Utc::now();
        let record = ImageRecord {
            id: state.next_id,
            user_id: user_id.to_string(),
            image_url: image_url.to_string(),
            evaluated: false,
            approved: false,
            review: None,
            copy: None,
            ad_id: None,
            created_at: now,
            updated_at: now,
        };
        state.rows.push(record.clone());
        Ok(record)
    }

    async fn unevaluated(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        Ok(self.select(user_id, |r| !r.evaluated).await)
    }

    async fn mark_evaluated(
        &self,
        id: u64,
        approved: bool,
        review: &str,
    ) -> Result<(), ExecutionFailure> {
        self.update(id, |row| {
            row.evaluated = true;
            row.approved = approved;
            row.review = Some(review.to_string());
        })
        .await
    }

    async fn awaiting_copy(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        Ok(self
            .select(user_id, |r| r.approved && r.copy.is_none())
            .await)
    }

    async fn attach_copy(&self, id: u64, copy: AdCopy) -> Result<(), ExecutionFailure> {
        self.update(id, |row| row.copy = Some(copy)).await
    }

    async fn ready_to_launch(&self, user_id: &str) -> Result<Vec<ImageRecord>, ExecutionFailure> {
        Ok(self
            .select(user_id, |r| r.approved && r.copy.is_some() && r.ad_id.is_none())
            .await)
    }

    async fn mark_launched(&self, id: u64, ad_id: &str) -> Result<(), ExecutionFailure> {
        self.update(id, |row| row.ad_id = Some(ad_id.to_string()))
            .await
    }
}
