//! Book content model and the step result contract
//!
//! Books are owned by the catalog and never mutated here. Engines consume a
//! `Step` and produce a `StepResult`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A book: ordered pages of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub pages: Vec<Page>,
}

impl Book {
    /// All step ids across every page
    pub fn step_ids(&self) -> HashSet<&str> {
        self.pages
            .iter()
            .flat_map(|p| p.steps.iter())
            .map(Step::id)
            .collect()
    }

    /// Find a step anywhere in the book
    pub fn find_step(&self, step_id: &str) -> Option<&Step> {
        self.pages
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id() == step_id)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// An ordered sequence of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Page {
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(Step::id).collect()
    }
}

/// Passive text, completed by marking it read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStep {
    pub id: String,
    pub text: String,
}

/// Oscillating indicator that must be stopped inside a target zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapTimingStep {
    pub id: String,
    pub prompt: String,
    /// One sweep of the track (0% to 100%) at speed multiplier 1.0
    pub duration_ms: f64,
    pub target_start_pct: f64,
    pub target_end_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_allowed: Option<u32>,
}

/// Hold input only while nobody is watching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealthPourStep {
    pub id: String,
    pub prompt: String,
    pub total_hold_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_max_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_max_ms: Option<f64>,
}

/// Survive for a fixed duration while mosquitoes converge on the center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosquitoDefenseStep {
    pub id: String,
    pub prompt: String,
    pub duration_ms: f64,
}

/// One unit of page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Text(TextStep),
    TapTiming(TapTimingStep),
    StealthPour(StealthPourStep),
    MosquitoDefense(MosquitoDefenseStep),
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Text(s) => &s.id,
            Step::TapTiming(s) => &s.id,
            Step::StealthPour(s) => &s.id,
            Step::MosquitoDefense(s) => &s.id,
        }
    }

    /// Wire discriminant, as stored in book JSON
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Text(_) => "text",
            Step::TapTiming(_) => "tap_timing",
            Step::StealthPour(_) => "stealth_pour",
            Step::MosquitoDefense(_) => "mosquito_defense",
        }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, Step::Text(_))
    }
}

/// Outcome status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Fail,
}

/// Free-form metadata attached to a result
pub type ResultMeta = BTreeMap<String, Value>;

/// Recorded outcome of a step, keyed by step id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResultMeta>,
}

impl StepResult {
    /// Plain success with no score (text steps)
    pub fn success(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Success,
            score: None,
            meta: None,
        }
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_meta(mut self, meta: ResultMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// Numeric metadata lookup (stored results are shown instead of live state)
    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta.as_ref()?.get(key)?.as_f64()
    }
}

/// True if `result` exists and is a success
pub fn is_success(result: Option<&StepResult>) -> bool {
    result.is_some_and(StepResult::is_success)
}
