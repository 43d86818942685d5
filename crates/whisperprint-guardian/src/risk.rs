//! Disclosure risk scoring.
//!
//! The score of a non-empty detection set is
//! `clamp(max(mean(cᵢ·wᵢ), peak_high), floor, ceiling)`, where `peak_high`
//! is the largest `cᵢ·wᵢ` among detections whose weight reaches
//! `high_severity_weight`. The peak term keeps the score from dropping when
//! a high-severity finding is added to a set of many low-severity ones.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::{Detection, DetectionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Safe,
    Review,
    Block,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Safe => "safe",
            Recommendation::Review => "review",
            Recommendation::Block => "block",
        }
    }
}

/// Weights and recommendation bands. Loaded from `risk-config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Per-type weights. Entries in the file override the defaults one by one.
    pub weights: BTreeMap<DetectionType, f64>,
    /// Weight for types missing from `weights`.
    pub default_weight: f64,
    pub high_severity_weight: f64,
    /// Scores strictly above this are `block`.
    pub block_above: f64,
    /// Scores at or above this are `review`.
    pub review_above: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: Self::default_weights(),
            default_weight: 0.5,
            high_severity_weight: 0.85,
            block_above: 0.8,
            review_above: 0.5,
            floor: 0.1,
            ceiling: 0.95,
        }
    }
}

impl RiskConfig {
    pub fn default_weights() -> BTreeMap<DetectionType, f64> {
        use DetectionType::*;
        BTreeMap::from([
            (Email, 0.4),
            (Phone, 0.4),
            (IpAddress, 0.3),
            (Address, 0.6),
            (DateOfBirth, 0.7),
            (Ssn, 0.9),
            (Passport, 0.85),
            (CreditCard, 0.9),
            (Iban, 0.9),
            (ApiKey, 0.85),
            (Password, 0.85),
            (PrivateKey, 0.95),
            (NerPerson, 0.5),
            (NerOrg, 0.3),
            (NerMoney, 0.7),
            (TopicMedical, 0.6),
            (TopicFinancial, 0.5),
            (TopicLegal, 0.5),
            (TopicCorporate, 0.4),
        ])
    }

    /// Load config from file, falling back to defaults when absent or invalid.
    pub fn load(config_path: &Path) -> Self {
        let raw = match std::fs::read_to_string(config_path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<RiskConfig>(&raw) {
            Ok(file) => {
                let mut weights = Self::default_weights();
                weights.extend(file.weights.clone());
                let config = Self { weights, ..file }.sanitized();
                info!("Loaded risk config from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Invalid risk config {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Clamp every value into `[0, 1]` and keep the bands ordered.
    fn sanitized(mut self) -> Self {
        let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        for w in self.weights.values_mut() {
            *w = unit(*w);
        }
        self.default_weight = unit(self.default_weight);
        self.high_severity_weight = unit(self.high_severity_weight);
        self.block_above = unit(self.block_above);
        self.review_above = unit(self.review_above).min(self.block_above);
        self.floor = unit(self.floor);
        self.ceiling = unit(self.ceiling).max(self.floor);
        self
    }

    /// Effective weight of `kind` for a given content type.
    ///
    /// `email` content halves the EMAIL weight and takes 30% off NER_PERSON,
    /// since addresses and names are expected there. `code` content raises
    /// API_KEY by 20%.
    pub fn weight(&self, kind: DetectionType, content_type: &str) -> f64 {
        let base = self.weights.get(&kind).copied().unwrap_or(self.default_weight);
        let factor = match (content_type, kind) {
            ("email", DetectionType::Email) => 0.5,
            ("email", DetectionType::NerPerson) => 0.7,
            ("code", DetectionType::ApiKey) => 1.2,
            _ => 1.0,
        };
        (base * factor).min(1.0)
    }
}

/// Score plus recommendation for one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub has_sensitive_data: bool,
    pub risk_score: f64,
    pub recommendation: Recommendation,
}

pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn score(&self, detections: &[Detection], content_type: &str) -> f64 {
        if detections.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut peak_high = 0.0f64;
        for d in detections {
            let w = self.config.weight(d.kind, content_type);
            let contribution = d.confidence.clamp(0.0, 1.0) * w;
            sum += contribution;
            if w >= self.config.high_severity_weight {
                peak_high = peak_high.max(contribution);
            }
        }
        let mean = sum / detections.len() as f64;
        mean.max(peak_high)
            .clamp(self.config.floor, self.config.ceiling)
    }

    pub fn recommend(&self, score: f64) -> Recommendation {
        if score > self.config.block_above {
            Recommendation::Block
        } else if score >= self.config.review_above {
            Recommendation::Review
        } else {
            Recommendation::Safe
        }
    }

    pub fn assess(&self, detections: &[Detection], content_type: &str) -> Assessment {
        let risk_score = self.score(detections, content_type);
        Assessment {
            has_sensitive_data: !detections.is_empty(),
            risk_score,
            recommendation: self.recommend(risk_score),
        }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
