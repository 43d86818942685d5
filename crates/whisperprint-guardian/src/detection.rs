//! Detection types, the recognizer trait, and the merging detector.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mask::{mask, MaskStyle};

/// Confidence added when a context keyword precedes a match.
pub const CONTEXT_BOOST: f64 = 0.1;

/// Characters before a match searched for context keywords.
pub const CONTEXT_WINDOW: usize = 40;

/// Kinds of sensitive content the guardian can detect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Iban,
    Passport,
    IpAddress,
    Address,
    DateOfBirth,
    ApiKey,
    Password,
    PrivateKey,
    NerPerson,
    NerOrg,
    NerMoney,
    TopicMedical,
    TopicFinancial,
    TopicLegal,
    TopicCorporate,
}

impl DetectionType {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionType::Email => "EMAIL",
            DetectionType::Phone => "PHONE",
            DetectionType::Ssn => "SSN",
            DetectionType::CreditCard => "CREDIT_CARD",
            DetectionType::Iban => "IBAN",
            DetectionType::Passport => "PASSPORT",
            DetectionType::IpAddress => "IP_ADDRESS",
            DetectionType::Address => "ADDRESS",
            DetectionType::DateOfBirth => "DATE_OF_BIRTH",
            DetectionType::ApiKey => "API_KEY",
            DetectionType::Password => "PASSWORD",
            DetectionType::PrivateKey => "PRIVATE_KEY",
            DetectionType::NerPerson => "NER_PERSON",
            DetectionType::NerOrg => "NER_ORG",
            DetectionType::NerMoney => "NER_MONEY",
            DetectionType::TopicMedical => "TOPIC_MEDICAL",
            DetectionType::TopicFinancial => "TOPIC_FINANCIAL",
            DetectionType::TopicLegal => "TOPIC_LEGAL",
            DetectionType::TopicCorporate => "TOPIC_CORPORATE",
        }
    }
}

/// Range of a detection. Recognizers report byte offsets into the text they
/// scan; [`Detector::detect_chars`] converts them to char offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A located, confidence-scored finding. Only the masked value is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Assigned by the caller once the detection is located in its content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DetectionType,
    pub confidence: f64,
    #[serde(rename = "location")]
    pub span: Span,
    #[serde(rename = "value")]
    pub masked_value: String,
}

impl Detection {
    /// Build a detection over `text[span]`, masking the matched value.
    pub fn new(
        kind: DetectionType,
        text: &str,
        span: Span,
        confidence: f64,
        style: MaskStyle,
    ) -> Self {
        Self {
            id: String::new(),
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            span,
            masked_value: mask(&text[span.start..span.end], style),
        }
    }
}

/// An independent detector for one kind of sensitive content.
pub trait Recognizer: Send + Sync {
    fn kind(&self) -> DetectionType;
    fn scan(&self, text: &str) -> Vec<Detection>;
}

/// Lowercased text of up to `chars` characters before byte offset `start`.
pub fn preceding_lowercase(text: &str, start: usize, chars: usize) -> String {
    let head = &text[..start];
    let from = head
        .char_indices()
        .rev()
        .take(chars)
        .last()
        .map_or(start, |(i, _)| i);
    head[from..].to_lowercase()
}

/// Whether any of `keywords` appears shortly before `start`.
pub fn has_context(text: &str, start: usize, keywords: &[&str]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let window = preceding_lowercase(text, start, CONTEXT_WINDOW);
    keywords.iter().any(|k| window.contains(k))
}

/// Structural check applied to each regex candidate.
pub type Gate = fn(&str, Span) -> bool;

/// Regex-driven recognizer. When a pattern has a capture group, group 1 is
/// the reported span (e.g. the value of `api_key = ...`).
pub struct PatternRecognizer {
    kind: DetectionType,
    patterns: Vec<(&'static Lazy<Regex>, f64)>,
    gate: Gate,
    context: &'static [&'static str],
    style: MaskStyle,
}

impl PatternRecognizer {
    pub fn new(
        kind: DetectionType,
        regex: &'static Lazy<Regex>,
        confidence: f64,
        style: MaskStyle,
    ) -> Self {
        Self {
            kind,
            patterns: vec![(regex, confidence)],
            gate: |_, _| true,
            context: &[],
            style,
        }
    }

    pub fn with_pattern(mut self, regex: &'static Lazy<Regex>, confidence: f64) -> Self {
        self.patterns.push((regex, confidence));
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_context(mut self, keywords: &'static [&'static str]) -> Self {
        self.context = keywords;
        self
    }
}

impl Recognizer for PatternRecognizer {
    fn kind(&self) -> DetectionType {
        self.kind
    }

    fn scan(&self, text: &str) -> Vec<Detection> {
        let mut detections = Vec::new();
        for (regex, base) in &self.patterns {
            for caps in regex.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let span = Span {
                    start: m.start(),
                    end: m.end(),
                };
                if span.is_empty() || !(self.gate)(text, span) {
                    continue;
                }
                let mut confidence = *base;
                if has_context(text, span.start, self.context) {
                    confidence += CONTEXT_BOOST;
                }
                detections.push(Detection::new(self.kind, text, span, confidence, self.style));
            }
        }
        detections
    }
}

/// Runs every recognizer and merges the results.
///
/// Overlapping detections of the same type collapse to the most confident
/// one (ties: longer span, then earlier start). Output is ordered by
/// `(start, type)`.
pub struct Detector {
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl Detector {
    pub fn new(recognizers: Vec<Box<dyn Recognizer>>) -> Self {
        Self { recognizers }
    }

    /// The fixed default set: structured PII, credentials, entities, topics.
    pub fn with_defaults() -> Self {
        let mut recognizers = crate::pii::recognizers();
        recognizers.extend(crate::secrets::recognizers());
        recognizers.extend(crate::entities::recognizers());
        recognizers.extend(crate::topics::recognizers());
        Self::new(recognizers)
    }

    pub fn kinds(&self) -> Vec<DetectionType> {
        let mut kinds: Vec<DetectionType> = self.recognizers.iter().map(|r| r.kind()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn detect(&self, text: &str) -> Vec<Detection> {
        let mut by_kind: BTreeMap<DetectionType, Vec<Detection>> = BTreeMap::new();
        for recognizer in &self.recognizers {
            for detection in recognizer.scan(text) {
                let Span { start, end } = detection.span;
                let in_bounds = start < end
                    && end <= text.len()
                    && text.is_char_boundary(start)
                    && text.is_char_boundary(end);
                if in_bounds {
                    by_kind.entry(detection.kind).or_default().push(detection);
                }
            }
        }

        let mut merged = Vec::new();
        for (_, mut candidates) in by_kind {
            candidates.sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then(b.span.len().cmp(&a.span.len()))
                    .then(a.span.start.cmp(&b.span.start))
            });
            let mut kept: Vec<Detection> = Vec::new();
            for candidate in candidates {
                if kept.iter().all(|k| !k.span.overlaps(&candidate.span)) {
                    kept.push(candidate);
                }
            }
            merged.extend(kept);
        }

        merged.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.kind.cmp(&b.kind)));
        merged
    }

    /// Like [`detect`](Self::detect), with spans counted in chars instead of bytes.
    pub fn detect_chars(&self, text: &str) -> Vec<Detection> {
        let starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let to_char = |byte: usize| starts.partition_point(|&b| b < byte);
        self.detect(text)
            .into_iter()
            .map(|mut d| {
                d.span = Span {
                    start: to_char(d.span.start),
                    end: to_char(d.span.end),
                };
                d
            })
            .collect()
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<(usize, usize, f64)>);

    impl Recognizer for Fixed {
        fn kind(&self) -> DetectionType {
            DetectionType::ApiKey
        }

        fn scan(&self, _text: &str) -> Vec<Detection> {
            self.0
                .iter()
                .map(|&(start, end, confidence)| Detection {
                    id: String::new(),
                    kind: self.kind(),
                    confidence,
                    span: Span { start, end },
                    masked_value: "****".into(),
                })
                .collect()
        }
    }

    #[test]
    fn test_same_type_overlap_keeps_most_confident() {
        let text = "token abcdefghijklmnop end";
        let detector = Detector::new(vec![
            Box::new(Fixed(vec![(6, 22, 0.8), (6, 14, 0.9)])),
            Box::new(Fixed(vec![(10, 22, 0.9)])),
        ]);
        let found = detector.detect(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, Span { start: 10, end: 22 });
    }

    #[test]
    fn test_out_of_bounds_spans_dropped() {
        let detector = Detector::new(vec![Box::new(Fixed(vec![(0, 3, 0.9), (2, 99, 0.9)]))]);
        let found = detector.detect("abcdef");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.end, 3);
    }

    #[test]
    fn test_char_offsets_after_non_ascii_prefix() {
        let text = "José \u{2014} SSN: 123-45-6789";
        let found = Detector::with_defaults().detect_chars(text);
        let ssn = found.iter().find(|d| d.kind == DetectionType::Ssn).unwrap();
        assert_eq!(ssn.span, Span { start: 12, end: 23 });
        let value: String = text.chars().skip(12).take(11).collect();
        assert_eq!(value, "123-45-6789");
    }

    #[test]
    fn test_preceding_window_is_char_safe() {
        let text = "naïve ssn: 123";
        let start = text.find("123").unwrap();
        assert_eq!(preceding_lowercase(text, start, 5), "ssn: ");
        assert!(has_context(text, start, &["ssn"]));
        assert!(!has_context(text, start, &[]));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(DetectionType::DateOfBirth).unwrap();
        assert_eq!(json, "DATE_OF_BIRTH");
        assert_eq!(DetectionType::TopicMedical.label(), "TOPIC_MEDICAL");
        assert_eq!(serde_json::to_value(DetectionType::NerPerson).unwrap(), "NER_PERSON");
    }
}
