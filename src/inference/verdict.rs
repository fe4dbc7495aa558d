//! Turning a raw model score into the response verdict

use serde::{Deserialize, Serialize};

/// Scores strictly above this are classified as AI-generated
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Decimal places of `ai_score`
pub const SCORE_DECIMALS: i32 = 4;
/// Decimal places of `confidence`
pub const CONFIDENCE_DECIMALS: i32 = 2;

/// Classification result for one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Probability the image is AI-generated, rounded to 4 decimals
    pub ai_score: f64,
    pub ai_generated: bool,
    /// Distance from the threshold scaled to 0..=100, rounded to 2 decimals
    pub confidence: f64,
}

impl Verdict {
    /// Build a verdict from a sigmoid output.
    ///
    /// `ai_generated` and `confidence` are derived from the rounded score so
    /// the three fields always agree with each other.
    pub fn from_score(score: f32) -> Self {
        let ai_score = round_to((score as f64).clamp(0.0, 1.0), SCORE_DECIMALS);
        Self {
            ai_score,
            ai_generated: ai_score > DECISION_THRESHOLD,
            confidence: round_to((ai_score - DECISION_THRESHOLD).abs() * 200.0, CONFIDENCE_DECIMALS),
        }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
