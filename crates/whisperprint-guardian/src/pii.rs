//! Structured PII recognizers: contact details, government and bank
//! identifiers, network addresses, postal addresses, dates of birth.
//!
//! Regex candidates must also pass a structural check (Luhn, SSN
//! allocation rules, ISO 13616 mod-97, octet range, calendar validity) so
//! look-alike digit runs are not reported.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::detection::{
    has_context, preceding_lowercase, DetectionType, PatternRecognizer, Recognizer, Span,
};
use crate::mask::MaskStyle;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d[-. ]?)?(?:\(\d{3}\)|\d{3})[-. ]?\d{3}[-. ]?\d{4}").unwrap()
});
static SSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b").unwrap());
static CC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").unwrap());
static IBAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z]{2}\d{2}(?: ?[A-Z0-9]{4}){2,7}(?: ?[A-Z0-9]{1,3})?\b").unwrap()
});
static PASSPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{1,2}\d{6,9}\b").unwrap());
static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,4}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Court|Ct|Place|Pl|Way)\b",
    )
    .unwrap()
});
static DOB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(?:19|20)\d{2}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.](?:19|20)\d{2})\b",
    )
    .unwrap()
});

const EMAIL_CONTEXT: &[&str] = &["email", "e-mail", "contact", "mailto"];
const PHONE_CONTEXT: &[&str] = &["phone", "tel", "call", "mobile", "cell", "fax"];
const SSN_CONTEXT: &[&str] = &["ssn", "social security", "tax id"];
const CARD_CONTEXT: &[&str] = &["card", "visa", "mastercard", "amex", "credit"];
const IBAN_CONTEXT: &[&str] = &["iban", "account", "bank", "transfer"];
const IP_CONTEXT: &[&str] = &["ip address", "ip:", "server", "host"];
const ADDRESS_CONTEXT: &[&str] = &["address", "lives at", "located at", "ship to"];
const DOB_CONTEXT: &[&str] = &["born", "birth", "dob"];

/// Default PII recognizers.
pub fn recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(
            PatternRecognizer::new(DetectionType::Email, &EMAIL_RE, 0.9, MaskStyle::EMAIL)
                .with_context(EMAIL_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::Phone, &PHONE_RE, 0.75, MaskStyle::NUMBER)
                .with_gate(phone_gate)
                .with_context(PHONE_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::Ssn, &SSN_RE, 0.85, MaskStyle::NUMBER)
                .with_gate(ssn_gate)
                .with_context(SSN_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::CreditCard, &CC_RE, 0.95, MaskStyle::NUMBER)
                .with_gate(card_gate)
                .with_context(CARD_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::Iban, &IBAN_RE, 0.95, MaskStyle::NUMBER)
                .with_gate(iban_gate)
                .with_context(IBAN_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::Passport, &PASSPORT_RE, 0.85, MaskStyle::NUMBER)
                .with_gate(passport_gate),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::IpAddress, &IPV4_RE, 0.7, MaskStyle::NUMBER)
                .with_gate(ipv4_gate)
                .with_context(IP_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::Address, &ADDRESS_RE, 0.7, MaskStyle::FULL)
                .with_context(ADDRESS_CONTEXT),
        ),
        Box::new(
            PatternRecognizer::new(DetectionType::DateOfBirth, &DOB_RE, 0.6, MaskStyle::NUMBER)
                .with_gate(dob_gate)
                .with_context(DOB_CONTEXT),
        ),
    ]
}

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Luhn checksum over the digits of `s`.
pub fn luhn_valid(s: &str) -> bool {
    let ds = digits(s);
    if ds.len() < 2 {
        return false;
    }
    let sum: u32 = ds
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// SSA allocation rules: area not 000, 666 or 9xx; group not 00; serial not 0000.
pub fn ssn_valid(s: &str) -> bool {
    let ds = digits(s);
    if ds.len() != 9 {
        return false;
    }
    let area = ds[0] * 100 + ds[1] * 10 + ds[2];
    let group = ds[3] * 10 + ds[4];
    let serial = ds[5] * 1000 + ds[6] * 100 + ds[7] * 10 + ds[8];
    area != 0 && area != 666 && area < 900 && group != 0 && serial != 0
}

/// ISO 13616 check: rearranged IBAN, letters as 10..35, must be 1 mod 97.
pub fn iban_valid(s: &str) -> bool {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if !(15..=34).contains(&compact.len()) || !compact.is_ascii() {
        return false;
    }
    let (head, tail) = compact.split_at(4);
    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}

fn char_before(text: &str, at: usize) -> Option<char> {
    text[..at].chars().next_back()
}

fn char_after(text: &str, at: usize) -> Option<char> {
    text[at..].chars().next()
}

/// No digit touches the span, directly or across a single separator.
fn isolated_digits(text: &str, span: Span) -> bool {
    let is_sep = |c: char| matches!(c, '-' | '.' | ' ');
    let before = char_before(text, span.start);
    let after = char_after(text, span.end);
    if before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    let before2 = before
        .filter(|c| is_sep(*c))
        .and_then(|c| char_before(text, span.start - c.len_utf8()));
    let after2 = after
        .filter(|c| is_sep(*c))
        .and_then(|c| char_after(text, span.end + c.len_utf8()));
    !before2.is_some_and(|c| c.is_ascii_digit()) && !after2.is_some_and(|c| c.is_ascii_digit())
}

fn phone_gate(text: &str, span: Span) -> bool {
    let n = digits(&text[span.start..span.end]).len();
    (10..=11).contains(&n) && isolated_digits(text, span)
}

fn ssn_gate(text: &str, span: Span) -> bool {
    let value = &text[span.start..span.end];
    if !ssn_valid(value) {
        return false;
    }
    let seps: Vec<char> = value.chars().filter(|c| !c.is_ascii_digit()).collect();
    match seps.as_slice() {
        [a, b] => a == b,
        [] => has_context(text, span.start, SSN_CONTEXT),
        _ => false,
    }
}

fn card_gate(text: &str, span: Span) -> bool {
    let value = &text[span.start..span.end];
    (13..=19).contains(&digits(value).len()) && luhn_valid(value)
}

fn iban_gate(text: &str, span: Span) -> bool {
    iban_valid(&text[span.start..span.end])
}

fn passport_gate(text: &str, span: Span) -> bool {
    preceding_lowercase(text, span.start, 40).contains("passport")
}

fn ipv4_gate(text: &str, span: Span) -> bool {
    let value = &text[span.start..span.end];
    let octets_ok = value
        .split('.')
        .all(|o| o.parse::<u16>().map(|v| v <= 255).unwrap_or(false));
    // Reject slices of longer dotted runs such as version strings.
    let dotted_before = char_before(text, span.start) == Some('.');
    let dotted_after = char_after(text, span.end) == Some('.')
        && text[span.end + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
    octets_ok && !dotted_before && !dotted_after
}

fn dob_gate(text: &str, span: Span) -> bool {
    let parts: Vec<i32> = text[span.start..span.end]
        .split(['-', '/', '.'])
        .filter_map(|p| p.parse().ok())
        .collect();
    let [a, b, c] = parts[..] else {
        return false;
    };
    let date = |y: i32, m: i32, d: i32| {
        u32::try_from(m)
            .ok()
            .zip(u32::try_from(d).ok())
            .and_then(|(m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .is_some()
    };
    if a >= 1000 {
        date(a, b, c)
    } else {
        date(c, a, b) || date(c, b, a)
    }
}
