use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::raw::RawConfig;
use super::{Employee, EmployeeRole};
use crate::error::ExecutionFailure;
use crate::services::{ExecutionContext, TaskReport};

const BASE_PROMPT: &str = "Is this image appropriate for an advertisement? \
    Please check for quality, offensive content, and commercial viability. \
    Start your answer with yes or no, then explain your reasoning.";

/// Review toggles, one per kind of problem the reviewer looks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaChecks {
    pub spell: bool,
    pub grammar: bool,
    pub visuals: bool,
    pub claims: bool,
    pub copyright: bool,
    pub policy: bool,
    pub offensive: bool,
    pub layout: bool,
    pub faces: bool,
    pub cta: bool,
    pub multi_lang: bool,
    pub prompt: bool,
    pub over_promise: bool,
}

impl QaChecks {
    /// Human-readable instructions for every enabled toggle, in a fixed order.
    pub fn instructions(&self) -> Vec<&'static str> {
        [
            (self.spell, "spelling mistakes in any visible text"),
            (self.grammar, "grammatical errors in any visible text"),
            (self.visuals, "visual artifacts, distortions or low image quality"),
            (self.claims, "unsubstantiated product claims"),
            (self.copyright, "copyrighted characters, logos or trademarks"),
            (self.policy, "violations of common ad platform policies"),
            (self.offensive, "offensive or insensitive content"),
            (self.layout, "cluttered or unbalanced layout"),
            (self.faces, "malformed or uncanny human faces"),
            (self.cta, "a missing or unclear call to action"),
            (self.multi_lang, "inconsistent mixing of languages"),
            (self.prompt, "leaked prompt text or generation instructions"),
            (self.over_promise, "exaggerated or over-promising statements"),
        ]
        .into_iter()
        .filter_map(|(enabled, text)| enabled.then_some(text))
        .collect()
    }
}

/// Valentina: reviews freshly generated images before they are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReviewerConfig {
    pub custom: String,
    pub checks: QaChecks,
}

/// Outcome of one image review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub explanation: String,
}

impl Verdict {
    /// Interprets a free-text review. A negative phrasing always wins over a
    /// positive one.
    pub fn from_response(text: &str) -> Self {
        let lower = text.to_lowercase();
        let negative = lower.contains("not appropriate") || lower.contains("inappropriate");
        let positive = lower.contains("yes") || lower.contains("appropriate");
        Self {
            is_valid: positive && !negative,
            explanation: text.trim().to_string(),
        }
    }
}

impl QaReviewerConfig {
    pub fn prompt(&self) -> String {
        let mut prompt = String::from(BASE_PROMPT);
        let checks = self.checks.instructions();
        if !checks.is_empty() {
            prompt.push_str("\nAlso check for:");
            for check in checks {
                prompt.push_str("\n- ");
                prompt.push_str(check);
            }
        }
        if !self.custom.trim().is_empty() {
            prompt.push_str("\nAdditional requirement from the brand: ");
            prompt.push_str(self.custom.trim());
        }
        prompt
    }
}

impl Employee for QaReviewerConfig {
    const ROLE: EmployeeRole = EmployeeRole::QaReviewer;

    fn from_raw(raw: &RawConfig<'_>) -> Self {
        Self {
            custom: raw.text("custom"),
            checks: QaChecks {
                spell: raw.flag("spell"),
                grammar: raw.flag("grammar"),
                visuals: raw.flag("visuals"),
                claims: raw.flag("claims"),
                copyright: raw.flag("copyright"),
                policy: raw.flag("policy"),
                offensive: raw.flag("offensive"),
                layout: raw.flag("layout"),
                faces: raw.flag("faces"),
                cta: raw.flag("cta"),
                multi_lang: raw.flag("multiLang"),
                prompt: raw.flag("prompt"),
                over_promise: raw.flag("overpromise"),
            },
        }
    }

    fn is_runnable(&self, _today: Weekday) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<TaskReport, ExecutionFailure> {
        let store = ctx.store()?;
        let pending = store.unevaluated(ctx.user_id).await?;
        if pending.is_empty() {
            return Ok(TaskReport::new(0, "no images awaiting review"));
        }

        let prompt = self.prompt();
        let (mut approved, mut rejected) = (0usize, 0usize);
        let mut last_error = None;
        for image in &pending {
            // Failed reviews leave the row unevaluated for the next run.
            let response = match ctx.services.analyze(&image.image_url, &prompt).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(user_id = ctx.user_id, image_id = image.id, error = %err, "Review failed");
                    last_error = Some(err);
                    continue;
                }
            };
            let verdict = Verdict::from_response(&response);
            store
                .mark_evaluated(image.id, verdict.is_valid, &verdict.explanation)
                .await?;
            info!(
                user_id = ctx.user_id,
                image_id = image.id,
                approved = verdict.is_valid,
                "Image reviewed"
            );
            if verdict.is_valid {
                approved += 1;
            } else {
                rejected += 1;
            }
        }

        let reviewed = approved + rejected;
        match last_error {
            Some(err) if reviewed == 0 => Err(err),
            _ => Ok(TaskReport::new(
                reviewed,
                format!("{approved} approved, {rejected} rejected of {} pending", pending.len()),
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
    use crate::services::testing::{FakeVision, services};
    use crate::store::{ImageStore, MemoryImageStore};

    fn config(value: serde_json::Value) -> QaReviewerConfig {
        let map: RawMap = serde_json::from_value(value).unwrap();
        QaReviewerConfig::from_raw(&RawConfig::new(&map))
    }

    #[test]
    fn from_raw_reads_camel_case_toggles() {
        let cfg = config(json!({
            "custom": "ensure my brand logo is there",
            "spell": true,
            "multiLang": true,
            "overpromise": true
        }));
        assert_eq!(cfg.custom, "ensure my brand logo is there");
        assert!(cfg.checks.spell);
        assert!(cfg.checks.multi_lang);
        assert!(cfg.checks.over_promise);
        assert!(!cfg.checks.grammar);
    }

    #[test]
    fn empty_config_is_still_runnable() {
        let cfg = config(json!({}));
        assert_eq!(cfg.checks, QaChecks::default());
        assert!(cfg.is_runnable(Weekday::Tue));
    }

    #[test]
    fn prompt_lists_enabled_checks_and_custom_text() {
        let cfg = config(json!({"custom": "logo top-left", "faces": true, "cta": true}));
        let prompt = cfg.prompt();
        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.contains("uncanny human faces"));
        assert!(prompt.contains("call to action"));
        assert!(!prompt.contains("spelling"));
        assert!(prompt.contains("logo top-left"));
    }

    #[test]
    fn verdict_parsing() {
        assert!(Verdict::from_response("Yes. Clean and on brand.").is_valid);
        assert!(Verdict::from_response("This image is appropriate.").is_valid);
        assert!(!Verdict::from_response("No, this is not appropriate.").is_valid);
        assert!(!Verdict::from_response("Yes it renders, but it is inappropriate.").is_valid);
        assert!(!Verdict::from_response("The hands are malformed.").is_valid);
    }

    #[tokio::test]
    async fn execute_marks_pending_images() {
        let services = Services {
            vision: Arc::new(FakeVision {
                reply: "No - the text is inappropriate.".into(),
            }),
            ..services()
        };
        let store = MemoryImageStore::new();
        store.insert_image("u1", "https://cdn.test/a.png").await.unwrap();
        store.insert_image("u1", "https://cdn.test/b.png").await.unwrap();
        let ctx = ExecutionContext {
            user_id: "u1",
            store: Some(&store),
            services: &services,
        };

        let report = config(json!({"spell": true})).execute(&ctx).await.unwrap();
        assert_eq!(report.produced, 2);
        assert!(store.unevaluated("u1").await.unwrap().is_empty());
        assert!(store.awaiting_copy("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn execute_with_nothing_pending_succeeds() {
        let services = services();
        let store = MemoryImageStore::new();
        let ctx = ExecutionContext {
            user_id: "u1",
            store: Some(&store),
            services: &services,
        };
        let report = config(json!({})).execute(&ctx).await.unwrap();
        assert_eq!(report.produced, 0);
    }
}
