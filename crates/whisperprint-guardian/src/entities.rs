//! Heuristic named-entity recognizers: people, organizations, money.
//!
//! No language model is involved. Person names need a title ("Dr.") or a cue
//! word ("Dear", "Patient:") in front of them, organizations need a legal
//! suffix, and amounts need a currency symbol or code.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::detection::{DetectionType, PatternRecognizer, Recognizer};
use crate::mask::MaskStyle;

static TITLED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\b").unwrap()
});
static CUED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:dear|attn:?|name:|patient:|employee:|signed by:?|regards,)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,2})\b",
    )
    .unwrap()
});
static ORG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Z][A-Za-z&]+(?:\s+[A-Z][A-Za-z&]+){0,3},?\s+(?:(?:Inc|Corp|Corporation|LLC|Ltd|GmbH|PLC)\b\.?|Co\.)",
    )
    .unwrap()
});
static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[$€£]\s?\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?(?:\s?(?:million|billion|thousand|[MBK])\b)?",
    )
    .unwrap()
});
static MONEY_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?\s?(?:USD|EUR|GBP|dollars|euros|pounds)\b")
        .unwrap()
});

/// Default entity recognizers.
pub fn recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(
            PatternRecognizer::new(DetectionType::NerPerson, &TITLED_NAME_RE, 0.85, MaskStyle::NAME)
                .with_pattern(&CUED_NAME_RE, 0.75),
        ),
        Box::new(PatternRecognizer::new(DetectionType::NerOrg, &ORG_RE, 0.7, MaskStyle::NAME)),
        Box::new(
            PatternRecognizer::new(DetectionType::NerMoney, &MONEY_RE, 0.9, MaskStyle::NUMBER)
                .with_pattern(&MONEY_CODE_RE, 0.85),
        ),
    ]
}
