use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::raw::RawConfig;
use super::{Employee, EmployeeRole};
use crate::error::ExecutionFailure;
use crate::services::{ExecutionContext, TaskReport};

/// Upper bound on images generated for one user in one run.
pub const MAX_ADS_PER_RUN: u32 = 50;

/// Marcus: generates ad images on the configured weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCreatorConfig {
    pub ads_per_day: u32,
    pub ad_guidance: String,
    pub product_urls: Vec<String>,
    pub run_days: Vec<String>,
}

impl AdCreatorConfig {
    /// Weekdays this employee runs on. Names match case-insensitively as
    /// abbreviations or in full; unrecognised entries are ignored.
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.run_days
            .iter()
            .filter_map(|day| day.trim().parse::<Weekday>().ok())
            .collect()
    }

    fn prompt(&self) -> String {
        let mut prompt = String::from(
            "Create a high-converting social media advertisement image for the product. \
             Use a clean composition with the product as the clear focal point.",
        );
        if !self.ad_guidance.trim().is_empty() {
            prompt.push_str("\nCreative direction: ");
            prompt.push_str(self.ad_guidance.trim());
        }
        prompt
    }

    async fn create_one(
        &self,
        ctx: &ExecutionContext<'_>,
        prompt: &str,
    ) -> Result<String, ExecutionFailure> {
        let store = ctx.store()?;
        let bytes = ctx.services.generate_image(prompt, &self.product_urls).await?;
        let file_name = format!("generated_{}.png", Uuid::new_v4().simple());
        let url = ctx.services.upload(&bytes, &file_name, "image/png").await?;
        store.insert_image(ctx.user_id, &url).await?;
        Ok(url)
    }
}

impl Employee for AdCreatorConfig {
    const ROLE: EmployeeRole = EmployeeRole::AdCreator;

    fn from_raw(raw: &RawConfig<'_>) -> Self {
        Self {
            ads_per_day: raw.number("adsPerDay"),
            ad_guidance: raw.text("adGuidance"),
            product_urls: raw.list("productUrls"),
            run_days: raw.list("days"),
        }
    }

    fn is_runnable(&self, today: Weekday) -> bool {
        self.weekdays().contains(&today)
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<TaskReport, ExecutionFailure> {
        ctx.store()?;
        let requested = self.ads_per_day.min(MAX_ADS_PER_RUN);
        if requested == 0 {
            return Ok(TaskReport::new(0, "no ads requested"));
        }

        let prompt = self.prompt();
        let mut produced = 0usize;
        let mut last_error = None;
        for n in 1..=requested {
            match self.create_one(ctx, &prompt).await {
                Ok(url) => {
                    produced += 1;
                    info!(user_id = ctx.user_id, n, url = %url, "Ad image stored");
                }
                Err(err) => {
                    warn!(user_id = ctx.user_id, n, error = %err, "Ad image failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if produced == 0 => Err(err),
            _ => Ok(TaskReport::new(
                produced,
                format!("{produced} of {requested} images generated"),
            )),
        }
    }
}
