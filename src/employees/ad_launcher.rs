use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::raw::RawConfig;
use super::{Employee, EmployeeRole};
use crate::error::ExecutionFailure;
use crate::publisher::AdSubmission;
use crate::services::{ExecutionContext, TaskReport};
use crate::store::ImageRecord;

pub const DEFAULT_CALL_TO_ACTION: &str = "SHOP_NOW";

/// Cameron: publishes approved images that have copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdLauncherConfig {
    pub landing_url: String,
    pub call_to_action: String,
    pub adsets: Vec<String>,
    pub daily_budget: u32,
}

impl AdLauncherConfig {
    /// The copy's own call to action wins over the configured one.
    fn submission(&self, user_id: &str, image: &ImageRecord) -> Option<AdSubmission> {
        let copy = image.copy.as_ref()?;
        Some(AdSubmission {
            user_id: user_id.to_string(),
            image_url: image.image_url.clone(),
            primary_text: copy.primary_text.clone(),
            headline: copy.headline.clone(),
            description: copy.description.clone(),
            call_to_action: copy
                .call_to_action
                .clone()
                .unwrap_or_else(|| self.call_to_action.clone()),
            landing_url: self.landing_url.clone(),
            adsets: self.adsets.clone(),
            daily_budget: self.daily_budget,
        })
    }
}

impl Employee for AdLauncherConfig {
    const ROLE: EmployeeRole = EmployeeRole::AdLauncher;

    fn from_raw(raw: &RawConfig<'_>) -> Self {
        Self {
            landing_url: raw.text("landingUrl"),
            call_to_action: raw.text_or("callToAction", DEFAULT_CALL_TO_ACTION),
            adsets: raw.list("adsets"),
            daily_budget: raw.number("dailyBudget"),
        }
    }

    fn is_runnable(&self, _today: Weekday) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<TaskReport, ExecutionFailure> {
        let store = ctx.store()?;
        if self.landing_url.trim().is_empty() {
            return Err(ExecutionFailure::Other("landing URL is not configured".into()));
        }
        let images = store.ready_to_launch(ctx.user_id).await?;
        if images.is_empty() {
            return Ok(TaskReport::new(0, "nothing ready to launch"));
        }

        let mut launched = 0usize;
        let mut last_error = None;
        for image in &images {
            let Some(submission) = self.submission(ctx.user_id, image) else {
                continue;
            };
            match ctx.services.publish(&submission).await {
                Ok(ad_id) => {
                    store.mark_launched(image.id, &ad_id).await?;
                    launched += 1;
                    info!(user_id = ctx.user_id, image_id = image.id, ad_id = %ad_id, "Ad launched");
                }
                Err(err) => {
                    warn!(user_id = ctx.user_id, image_id = image.id, error = %err, "Launch failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if launched == 0 => Err(err),
            _ => Ok(TaskReport::new(
                launched,
                format!("{launched} of {} ads launched", images.len()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::employees::raw::RawMap;
    use crate::services::Services;
    use crate::services::testing::{FakePublisher, services};
    use crate::store::{AdCopy, ImageStore, MemoryImageStore};

    fn config(value: serde_json::Value) -> AdLauncherConfig {
        let map: RawMap = serde_json::from_value(value).unwrap();
        AdLauncherConfig::from_raw(&RawConfig::new(&map))
    }

    #[test]
    fn from_raw_defaults_call_to_action() {
        let cfg = config(json!({"landingUrl": "https://shop.test"}));
        assert_eq!(cfg.call_to_action, DEFAULT_CALL_TO_ACTION);
        assert_eq!(cfg.daily_budget, 0);
        assert!(cfg.adsets.is_empty());
        assert!(cfg.is_runnable(Weekday::Sun));
    }

    #[tokio::test]
    async fn execute_requires_landing_url() {
        let services = services();
        let store = MemoryImageStore::new();
        let ctx = ExecutionContext {
            user_id: "u1",
            store: Some(&store),
            services: &services,
        };
        let err = config(json!({})).execute(&ctx).await.unwrap_err();
        assert!(matches!(err, ExecutionFailure::Other(_)));
    }

    #[tokio::test]
    async fn execute_publishes_each_ready_image_once() {
        let publisher = Arc::new(FakePublisher::default());
        let services = Services {
            publisher: publisher.clone(),
            ..services()
        };
        let store = MemoryImageStore::new();
        let row = store.insert_image("u1", "https://cdn.test/a.png").await.unwrap();
        store.mark_evaluated(row.id, true, "ok").await.unwrap();
        store
            .attach_copy(
                row.id,
                AdCopy {
                    primary_text: "Stay dry".into(),
                    headline: "Rain-proof".into(),
                    description: String::new(),
                    call_to_action: None,
                },
            )
            .await
            .unwrap();
        let ctx = ExecutionContext {
            user_id: "u1",
            store: Some(&store),
            services: &services,
        };
        let cfg = config(json!({
            "landingUrl": "https://shop.test",
            "adsets": ["120223396371790161"],
            "dailyBudget": 40
        }));

        let report = cfg.execute(&ctx).await.unwrap();
        assert_eq!(report.produced, 1);
        {
            let published = publisher.published.lock().unwrap();
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].headline, "Rain-proof");
            assert_eq!(published[0].adsets, vec!["120223396371790161"]);
            assert_eq!(published[0].daily_budget, 40);
            assert_eq!(published[0].call_to_action, DEFAULT_CALL_TO_ACTION);
        }

        // a second run finds nothing left to launch
        let report = cfg.execute(&ctx).await.unwrap();
        assert_eq!(report.produced, 0);
    }
}
