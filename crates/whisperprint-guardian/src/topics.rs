//! Sensitive-topic recognizers driven by keyword lists.
//!
//! One detection per topic, spanning the first keyword hit. Confidence grows
//! with the number of distinct keywords found.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::detection::{Detection, DetectionType, Recognizer, Span};
use crate::mask::MaskStyle;

const BASE_CONFIDENCE: f64 = 0.6;
const PER_KEYWORD: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;

const MEDICAL: &[&str] = &[
    "diagnosis", "patient", "treatment", "hospital", "medication", "disease", "symptom",
    "symptoms", "doctor", "health", "medical", "clinical", "prescription",
];
const FINANCIAL: &[&str] = &[
    "bank", "account", "credit", "debit", "loan", "mortgage", "payment", "transaction",
    "finance", "salary", "income", "tax", "revenue",
];
const LEGAL: &[&str] = &[
    "contract", "agreement", "lawsuit", "legal", "attorney", "court", "judge", "plaintiff",
    "defendant", "settlement", "confidential", "privileged",
];
const CORPORATE: &[&str] = &[
    "confidential", "internal", "proprietary", "trade secret", "intellectual property",
    "strategy", "roadmap", "unreleased", "merger", "acquisition",
];

fn keyword_regex(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
}

static MEDICAL_RE: Lazy<Regex> = Lazy::new(|| keyword_regex(MEDICAL));
static FINANCIAL_RE: Lazy<Regex> = Lazy::new(|| keyword_regex(FINANCIAL));
static LEGAL_RE: Lazy<Regex> = Lazy::new(|| keyword_regex(LEGAL));
static CORPORATE_RE: Lazy<Regex> = Lazy::new(|| keyword_regex(CORPORATE));

pub struct TopicRecognizer {
    kind: DetectionType,
    keywords: &'static Lazy<Regex>,
}

impl TopicRecognizer {
    pub fn new(kind: DetectionType, keywords: &'static Lazy<Regex>) -> Self {
        Self { kind, keywords }
    }
}

impl Recognizer for TopicRecognizer {
    fn kind(&self) -> DetectionType {
        self.kind
    }

    fn scan(&self, text: &str) -> Vec<Detection> {
        let mut first: Option<Span> = None;
        let mut distinct = BTreeSet::new();
        for m in self.keywords.find_iter(text) {
            first.get_or_insert(Span {
                start: m.start(),
                end: m.end(),
            });
            distinct.insert(m.as_str().to_lowercase());
        }

        match first {
            Some(span) => {
                let extra = distinct.len().saturating_sub(1) as f64;
                let confidence = (BASE_CONFIDENCE + PER_KEYWORD * extra).min(MAX_CONFIDENCE);
                vec![Detection::new(self.kind, text, span, confidence, MaskStyle::CREDENTIAL)]
            }
            None => Vec::new(),
        }
    }
}

/// Default topic recognizers.
pub fn recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(TopicRecognizer::new(DetectionType::TopicMedical, &MEDICAL_RE)),
        Box::new(TopicRecognizer::new(DetectionType::TopicFinancial, &FINANCIAL_RE)),
        Box::new(TopicRecognizer::new(DetectionType::TopicLegal, &LEGAL_RE)),
        Box::new(TopicRecognizer::new(DetectionType::TopicCorporate, &CORPORATE_RE)),
    ]
}
