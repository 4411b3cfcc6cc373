//! Lenient accessors over a raw employee configuration block.
//!
//! Every lookup is total: a missing key, or a value of an unusable type,
//! yields the default from [`defaults`]. Role factories read their fields
//! exclusively through [`RawConfig`] so the fallback policy lives in one place.

use serde_json::{Map, Value};

/// A raw configuration block as supplied by the task data provider.
pub type RawMap = Map<String, Value>;

/// Values used when a key is absent or cannot be interpreted.
pub mod defaults {
    pub const NUMBER: u32 = 0;
    pub const TEXT: &str = "";
    pub const FLAG: bool = false;
}

/// Borrowed view over a [`RawMap`] with typed, defaulting getters.
#[derive(Debug, Clone, Copy)]
pub struct RawConfig<'a> {
    map: &'a RawMap,
}

impl<'a> RawConfig<'a> {
    pub fn new(map: &'a RawMap) -> Self {
        Self { map }
    }

    /// Non-negative integer. Accepts JSON numbers and numeric strings
    /// (`"20"`), since upstream forms submit counts as text.
    pub fn number(&self, key: &str) -> u32 {
        match self.map.get(key) {
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u32))
                .unwrap_or(defaults::NUMBER),
            Some(Value::String(s)) => parse_numeric(s).unwrap_or(defaults::NUMBER),
            _ => defaults::NUMBER,
        }
    }

    pub fn text(&self, key: &str) -> String {
        self.text_or(key, defaults::TEXT)
    }

    /// Text with a field-specific fallback. Numbers and booleans are
    /// rendered as text; empty strings count as present.
    pub fn text_or(&self, key: &str, fallback: &str) -> String {
        match self.map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => fallback.to_string(),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => defaults::FLAG,
        }
    }

    /// List of strings. A bare string is treated as a one-element list;
    /// non-textual array elements are skipped.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.map.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

fn parse_numeric(s: &str) -> Option<u32> {
    let trimmed = s.trim();
    trimmed.parse::<u32>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.min(f64::from(u32::MAX)) as u32)
    })
}
