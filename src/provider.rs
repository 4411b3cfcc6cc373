//! Sources of per-user task configuration for a batch run.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AdcrewError;

/// One user's raw `{employee name -> configuration}` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTaskData {
    pub user_id: String,
    pub data: Value,
}

#[async_trait]
pub trait TaskDataProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<UserTaskData>, AdcrewError>;
}

/// Reads task data from a JSON or TOML file.
///
/// Accepted shapes: a JSON array of `{user_id, data}` entries, or a
/// document with a `users` array of them (JSON or TOML, chosen by
/// extension). Entries without a `user_id` are skipped with a warning; the
/// `data` value itself is passed through untouched so the parser can
/// reject it per user.
pub struct FileTaskProvider {
    path: PathBuf,
}

impl FileTaskProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskDataProvider for FileTaskProvider {
    async fn fetch(&self) -> Result<Vec<UserTaskData>, AdcrewError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let is_toml = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let document: Value = if is_toml {
            let table: toml::Table = toml::from_str(&contents)?;
            serde_json::to_value(table)?
        } else {
            serde_json::from_str(&contents)?
        };
        parse_entries(document)
    }
}

fn parse_entries(document: Value) -> Result<Vec<UserTaskData>, AdcrewError> {
    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("users") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(AdcrewError::MalformedInput(
                    "task file must contain a `users` array".into(),
                ));
            }
        },
        _ => {
            return Err(AdcrewError::MalformedInput(
                "task file must be an array of users or a table with `users`".into(),
            ));
        }
    };

    let mut users = Vec::with_capacity(entries.len());
    for (index, mut entry) in entries.into_iter().enumerate() {
        let user_id = match entry.get("user_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                warn!(index, "skipping task entry without user_id");
                continue;
            }
        };
        let data = entry
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        users.push(UserTaskData { user_id, data });
    }
    Ok(users)
}
