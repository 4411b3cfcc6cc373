use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::raw::RawConfig;
use super::{Employee, EmployeeRole};
use crate::error::ExecutionFailure;
use crate::services::{ExecutionContext, TaskReport};
use crate::store::AdCopy;

/// Avery: writes copy for approved images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopywriterConfig {
    pub tone: String,
    /// Target length of the primary text in words. Zero leaves it to the model.
    pub length: u32,
    pub guidance: String,
    pub ctas: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DraftCopy {
    primary_text: String,
    headline: String,
    #[serde(default)]
    description: String,
}

impl CopywriterConfig {
    pub fn prompt(&self, image_url: &str) -> String {
        let mut prompt = format!(
            "Write advertising copy for the ad image at {image_url}.\n\
             Respond with ONLY valid JSON, no other text.\n\
             Format: {{\"primary_text\": \"...\", \"headline\": \"...\", \"description\": \"...\"}}"
        );
        if !self.tone.trim().is_empty() {
            prompt.push_str(&format!("\nTone: {}", self.tone.trim()));
        }
        if self.length > 0 {
            prompt.push_str(&format!("\nPrimary text length: about {} words", self.length));
        }
        if !self.guidance.trim().is_empty() {
            prompt.push_str(&format!("\nGuidance: {}", self.guidance.trim()));
        }
        prompt
    }

    /// Builds [`AdCopy`] from a model reply. Replies that are not the
    /// requested JSON are used verbatim as primary text, with the first line
    /// as headline.
    pub fn parse_copy(&self, reply: &str) -> AdCopy {
        let call_to_action = self.ctas.first().cloned();
        match serde_json::from_str::<DraftCopy>(reply.trim()) {
            Ok(draft) => AdCopy {
                primary_text: draft.primary_text,
                headline: draft.headline,
                description: draft.description,
                call_to_action,
            },
            Err(_) => {
                let text = reply.trim();
                let headline: String = text.lines().next().unwrap_or_default().chars().take(40).collect();
                AdCopy {
                    primary_text: text.to_string(),
                    headline,
                    description: String::new(),
                    call_to_action,
                }
            }
        }
    }
}

impl Employee for CopywriterConfig {
    const ROLE: EmployeeRole = EmployeeRole::Copywriter;

    fn from_raw(raw: &RawConfig<'_>) -> Self {
        Self {
            tone: raw.text("tone"),
            length: raw.number("length"),
            guidance: raw.text("guidance"),
            ctas: raw.list("ctas"),
        }
    }

    fn is_runnable(&self, _today: Weekday) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<TaskReport, ExecutionFailure> {
        let store = ctx.store()?;
        let images = store.awaiting_copy(ctx.user_id).await?;
        if images.is_empty() {
            return Ok(TaskReport::new(0, "no approved images need copy"));
        }

        let mut written = 0usize;
        let mut last_error = None;
        for image in &images {
            match ctx.services.write_copy(&self.prompt(&image.image_url)).await {
                Ok(reply) => {
                    store.attach_copy(image.id, self.parse_copy(&reply)).await?;
                    written += 1;
                    info!(user_id = ctx.user_id, image_id = image.id, "Copy attached");
                }
                Err(err) => {
                    warn!(user_id = ctx.user_id, image_id = image.id, error = %err, "Copy failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if written == 0 => Err(err),
            _ => Ok(TaskReport::new(
                written,
                format!("copy written for {written} of {} images", images.len()),
            )),
        }
    }
}
