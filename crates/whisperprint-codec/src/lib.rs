//! WhisperPrint Codec: invisible watermark carried in default-ignorable characters.
//!
//! A watermark is `R` copies of a 25-byte frame:
//!
//! ```text
//! [redundancy:1][visible_len:4 BE][uuid:16][checksum:4]
//! ```
//!
//! where the checksum is the first four bytes of `SHA-256(key ‖ first 21 bytes)`.
//! Each byte is written as four 2-bit symbols, and every frame is wrapped in
//! start/end delimiters. Copies sit at evenly spaced anchors of the visible
//! text, snapped to word ends, so any sufficiently long excerpt still carries
//! whole frames. The visible text is never modified.
//!
//! Data symbols are variation selectors VS1..VS4 and the delimiters are the
//! invisible math operators U+2062/U+2063. ZWJ and ZWNJ are left alone since
//! emoji sequences and Indic or Persian shaping depend on them. Only
//! characters inside a frame are treated as watermark; the same code points
//! elsewhere in the text belong to the caller.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use whisperprint_core::CodecSettings;

/// 2-bit data symbols, indexed by value.
pub const SYMBOLS: [char; 4] = ['\u{FE00}', '\u{FE01}', '\u{FE02}', '\u{FE03}'];
pub const FRAME_START: char = '\u{2062}';
pub const FRAME_END: char = '\u{2063}';

pub const FRAME_BYTES: usize = 25;
pub const FRAME_SYMBOLS: usize = FRAME_BYTES * 4;
const BODY_BYTES: usize = 21;

pub const MAX_REDUNDANCY: usize = 32;

/// Whether `c` belongs to the watermark alphabet.
pub fn is_carrier(c: char) -> bool {
    symbol_value(c).is_some() || c == FRAME_START || c == FRAME_END
}

fn symbol_value(c: char) -> Option<u8> {
    match c {
        '\u{FE00}' => Some(0),
        '\u{FE01}' => Some(1),
        '\u{FE02}' => Some(2),
        '\u{FE03}' => Some(3),
        _ => None,
    }
}

/// Remove watermark frames, leaving the visible text.
///
/// A frame is `FRAME_START`, data symbols, `FRAME_END`. A frame cut off by the
/// edge of an excerpt (trailing start without an end, or leading data ending
/// in `FRAME_END`) is removed too. Alphabet characters outside a frame are
/// kept.
pub fn strip(text: &str) -> String {
    strip_indexed(text).0
}

/// [`strip`], plus the char index in `text` of every char kept.
pub fn strip_indexed(text: &str) -> (String, Vec<usize>) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut positions = Vec::with_capacity(chars.len());
    let mut i = match leading_fragment_end(&chars) {
        Some(end) => end + 1,
        None => 0,
    };
    while i < chars.len() {
        if chars[i] == FRAME_START {
            let mut j = i + 1;
            while j < chars.len() && symbol_value(chars[j]).is_some() {
                j += 1;
            }
            if j == chars.len() {
                break;
            }
            if chars[j] == FRAME_END {
                i = j + 1;
                continue;
            }
        }
        out.push(chars[i]);
        positions.push(i);
        i += 1;
    }
    (out, positions)
}

/// Index of the `FRAME_END` closing a frame whose start was cut off.
fn leading_fragment_end(chars: &[char]) -> Option<usize> {
    let end = chars.iter().position(|c| symbol_value(*c).is_none())?;
    (chars[end] == FRAME_END).then_some(end)
}

/// Number of visible (non-watermark) characters.
pub fn visible_len(text: &str) -> usize {
    strip(text).chars().count()
}

/// Outcome of decoding a possibly partial excerpt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    /// Recovered recipient uuid. `None` when nothing valid was found or
    /// two identities are equally supported.
    pub bits: Option<Uuid>,
    /// `min(1, copies_recovered / copies_expected)`.
    pub confidence: f64,
    pub copies_recovered: usize,
    /// Copies an excerpt of this visible length should carry.
    pub copies_expected: f64,
    /// Visible length of the text the watermark was originally embedded in.
    pub source_visible_len: Option<u32>,
}

impl Decoded {
    fn none() -> Self {
        Self {
            bits: None,
            confidence: 0.0,
            copies_recovered: 0,
            copies_expected: 0.0,
            source_visible_len: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    redundancy: u8,
    visible_len: u32,
    uuid: Uuid,
}

/// Watermark encoder/decoder. Pure; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Codec {
    redundancy: usize,
    key: Vec<u8>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::from_settings(&CodecSettings::default())
    }
}

impl Codec {
    /// `redundancy` is clamped to `1..=32`. An empty `secret` gives unkeyed checksums.
    pub fn new(redundancy: usize, secret: &str) -> Self {
        Self {
            redundancy: redundancy.clamp(1, MAX_REDUNDANCY),
            key: secret.as_bytes().to_vec(),
        }
    }

    pub fn from_settings(settings: &CodecSettings) -> Self {
        Self::new(settings.redundancy, &settings.secret)
    }

    pub fn redundancy(&self) -> usize {
        self.redundancy
    }

    /// Embed `uuid` into `text`.
    ///
    /// Frames already present are removed first, so re-encoding replaces an
    /// earlier watermark rather than nesting one.
    pub fn encode(&self, text: &str, uuid: &Uuid) -> String {
        let chars: Vec<char> = strip(text).chars().collect();
        let n = chars.len();
        let frame = self.frame(uuid, u32::try_from(n).unwrap_or(u32::MAX));

        let r = self.redundancy;
        let mut anchors: Vec<usize> = (0..r)
            .map(|i| snap_to_word_end(&chars, (2 * i + 1) * n / (2 * r)))
            .collect();
        anchors.sort_unstable();

        let mut out = String::with_capacity(text.len() + r * frame.len());
        let mut pending = anchors.iter().peekable();
        for (pos, c) in chars.iter().enumerate() {
            while pending.next_if(|&&a| a == pos).is_some() {
                out.push_str(&frame);
            }
            out.push(*c);
        }
        for _ in pending {
            out.push_str(&frame);
        }
        out
    }

    /// Recover the embedded uuid from `text`, which may be a partial excerpt.
    pub fn decode(&self, text: &str) -> Decoded {
        let mut frames: Vec<Frame> = Vec::new();
        let mut current: Option<Vec<u8>> = None;

        for c in text.chars() {
            if c == FRAME_START {
                current = Some(Vec::with_capacity(FRAME_SYMBOLS));
            } else if c == FRAME_END {
                if let Some(symbols) = current.take() {
                    if let Some(frame) = self.parse_frame(&symbols) {
                        frames.push(frame);
                    }
                }
            } else if let (Some(v), Some(symbols)) = (symbol_value(c), current.as_mut()) {
                symbols.push(v);
            }
        }

        let mut groups: BTreeMap<Uuid, Vec<Frame>> = BTreeMap::new();
        for frame in frames {
            groups.entry(frame.uuid).or_default().push(frame);
        }

        let mut ranked: Vec<&Vec<Frame>> = groups.values().collect();
        ranked.sort_by(|a, b| b.len().cmp(&a.len()));
        let winner = match ranked.as_slice() {
            [] => return Decoded::none(),
            [first, second, ..] if first.len() == second.len() => return Decoded::none(),
            [first, ..] => *first,
        };

        // One embedding never holds more than `r` copies, so text pasted
        // around an excerpt cannot raise the expectation past that.
        let head = winner[0];
        let r = f64::from(head.redundancy);
        let observed_visible = visible_len(text) as f64;
        let copies_expected = if head.visible_len == 0 {
            r
        } else {
            (r * observed_visible / f64::from(head.visible_len)).clamp(1.0, r)
        };
        let copies_recovered = winner.len();
        let confidence = (copies_recovered as f64 / copies_expected).min(1.0);

        Decoded {
            bits: Some(head.uuid),
            confidence,
            copies_recovered,
            copies_expected,
            source_visible_len: Some(head.visible_len),
        }
    }

    fn frame(&self, uuid: &Uuid, visible_len: u32) -> String {
        let mut bytes = [0u8; FRAME_BYTES];
        bytes[0] = self.redundancy as u8;
        bytes[1..5].copy_from_slice(&visible_len.to_be_bytes());
        bytes[5..BODY_BYTES].copy_from_slice(uuid.as_bytes());
        let sum = self.checksum(&bytes[..BODY_BYTES]);
        bytes[BODY_BYTES..].copy_from_slice(&sum);

        let mut s = String::with_capacity((FRAME_SYMBOLS + 2) * 3);
        s.push(FRAME_START);
        for b in bytes {
            for shift in [6, 4, 2, 0] {
                s.push(SYMBOLS[usize::from((b >> shift) & 0b11)]);
            }
        }
        s.push(FRAME_END);
        s
    }

    fn parse_frame(&self, symbols: &[u8]) -> Option<Frame> {
        if symbols.len() != FRAME_SYMBOLS {
            return None;
        }
        let bytes: Vec<u8> = symbols
            .chunks_exact(4)
            .map(|q| q.iter().fold(0u8, |acc, v| (acc << 2) | v))
            .collect();

        if self.checksum(&bytes[..BODY_BYTES]) != bytes[BODY_BYTES..] {
            return None;
        }
        let redundancy = bytes[0];
        if redundancy == 0 {
            return None;
        }
        let visible_len = u32::from_be_bytes(bytes[1..5].try_into().ok()?);
        let uuid = Uuid::from_bytes(bytes[5..BODY_BYTES].try_into().ok()?);
        Some(Frame {
            redundancy,
            visible_len,
            uuid,
        })
    }

    fn checksum(&self, body: &[u8]) -> [u8; 4] {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update(body);
        let digest = hasher.finalize();
        [digest[0], digest[1], digest[2], digest[3]]
    }
}

/// Nearest insertion point at the end of a word. Falls back to `target`
/// when the text has no words.
fn snap_to_word_end(chars: &[char], target: usize) -> usize {
    let n = chars.len();
    let target = target.min(n);
    let is_word_end =
        |p: usize| p > 0 && !chars[p - 1].is_whitespace() && (p == n || chars[p].is_whitespace());

    for d in 0..=n {
        if target + d <= n && is_word_end(target + d) {
            return target + d;
        }
        if d <= target && is_word_end(target - d) {
            return target - d;
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Quarterly figures are confidential and must not leave the finance team. \
        The board will review the draft on Thursday before the public release.";

    fn carriers(text: &str) -> usize {
        text.chars().filter(|c| is_carrier(*c)).count()
    }

    #[test]
    fn test_round_trip_full_confidence() {
        let codec = Codec::default();
        let uuid = Uuid::new_v4();
        let marked = codec.encode(TEXT, &uuid);

        let decoded = codec.decode(&marked);
        assert_eq!(decoded.bits, Some(uuid));
        assert_eq!(decoded.confidence, 1.0);
        assert_eq!(decoded.copies_recovered, 5);
        assert_eq!(decoded.source_visible_len, Some(TEXT.chars().count() as u32));
    }

    #[test]
    fn test_visible_text_unchanged() {
        let codec = Codec::new(3, "");
        let marked = codec.encode(TEXT, &Uuid::new_v4());
        assert_eq!(strip(&marked), TEXT);
        assert_eq!(carriers(&marked), 3 * (FRAME_SYMBOLS + 2));
    }

    #[test]
    fn test_frames_attach_to_word_ends() {
        let codec = Codec::new(4, "");
        let marked = codec.encode(TEXT, &Uuid::new_v4());
        let chars: Vec<char> = marked.chars().collect();
        for (i, c) in chars.iter().enumerate() {
            if *c == FRAME_START && i > 0 && !is_carrier(chars[i - 1]) {
                assert!(!chars[i - 1].is_whitespace());
            }
        }
    }

    #[test]
    fn test_plain_text_has_no_match() {
        let decoded = Codec::default().decode("plain unwatermarked text");
        assert_eq!(decoded.bits, None);
        assert_eq!(decoded.confidence, 0.0);
    }

    #[test]
    fn test_wrong_key_rejects_frames() {
        let marked = Codec::new(5, "alpha").encode(TEXT, &Uuid::new_v4());
        assert_eq!(Codec::new(5, "beta").decode(&marked).bits, None);
    }

    #[test]
    fn test_tie_between_identities_is_not_guessed() {
        let codec = Codec::new(1, "");
        let a = codec.encode("first part of the memo", &Uuid::new_v4());
        let b = codec.encode("second part of the memo", &Uuid::new_v4());
        let decoded = codec.decode(&format!("{} {}", a, b));
        assert_eq!(decoded.bits, None);
        assert_eq!(decoded.confidence, 0.0);
    }

    #[test]
    fn test_majority_identity_wins() {
        let codec = Codec::new(2, "");
        let winner = Uuid::new_v4();
        let a = codec.encode("the majority copy of this note", &winner);
        let b = Codec::new(1, "").encode("a stray copy", &Uuid::new_v4());
        assert_eq!(codec.decode(&format!("{}\n{}", a, b)).bits, Some(winner));
    }

    #[test]
    fn test_reencode_replaces_watermark() {
        let codec = Codec::new(2, "");
        let first = codec.encode(TEXT, &Uuid::new_v4());
        let second_id = Uuid::new_v4();
        let second = codec.encode(&first, &second_id);
        assert_eq!(strip(&second), TEXT);
        let decoded = codec.decode(&second);
        assert_eq!(decoded.bits, Some(second_id));
        assert_eq!(decoded.copies_recovered, 2);
    }

    #[test]
    fn test_short_and_empty_text() {
        let codec = Codec::new(3, "");
        let uuid = Uuid::new_v4();
        assert_eq!(codec.decode(&codec.encode("hi", &uuid)).bits, Some(uuid));

        let empty = codec.encode("", &uuid);
        assert_eq!(strip(&empty), "");
        let decoded = codec.decode(&empty);
        assert_eq!(decoded.bits, Some(uuid));
        assert_eq!(decoded.confidence, 1.0);
    }

    #[test]
    fn test_joiners_and_emoji_survive() {
        let codec = Codec::default();
        let uuid = Uuid::new_v4();
        for text in [
            "Family photo \u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467} from the weekend trip",
            "\u{645}\u{6CC}\u{200C}\u{62E}\u{648}\u{627}\u{647}\u{645} \u{628}\u{631}\u{648}\u{645} \u{62E}\u{627}\u{646}\u{647}",
            "Zero\u{200B}width and word\u{2060}joiner stay put",
        ] {
            let marked = codec.encode(text, &uuid);
            assert_eq!(strip(&marked), text);
            assert_eq!(visible_len(&marked), text.chars().count());
            let decoded = codec.decode(&marked);
            assert_eq!(decoded.bits, Some(uuid));
            assert_eq!(decoded.confidence, 1.0);
        }
    }

    #[test]
    fn test_strip_keeps_unframed_alphabet() {
        let text = "x\u{FE00} a \u{2062} b \u{2063}";
        assert_eq!(strip(text), text);
    }

    #[test]
    fn test_strip_removes_cut_frames() {
        let codec = Codec::new(1, "");
        let frame = codec.frame(&Uuid::new_v4(), 10);
        let chars: Vec<char> = frame.chars().collect();
        let tail: String = chars[30..].iter().collect();
        let head: String = chars[..30].iter().collect();
        assert_eq!(strip(&format!("{}leaked words{}", tail, head)), "leaked words");
    }

    #[test]
    fn test_strip_indexed_positions() {
        let codec = Codec::new(2, "");
        let marked = codec.encode("Card 4111 1111", &Uuid::new_v4());
        let (visible, positions) = strip_indexed(&marked);
        assert_eq!(visible, "Card 4111 1111");
        let chars: Vec<char> = marked.chars().collect();
        for (c, &at) in visible.chars().zip(&positions) {
            assert_eq!(chars[at], c);
        }
    }

    #[test]
    fn test_surrounding_text_does_not_dilute_confidence() {
        let codec = Codec::default();
        let uuid = Uuid::new_v4();
        let marked = codec.encode("Report body", &uuid);
        let email = format!(
            "Hi team, forwarding something I found on a public paste site this morning. \
             Please take a look before the call.\n\n{}\n\nThanks, and let me know what you think.",
            marked
        );
        let decoded = codec.decode(&email);
        assert_eq!(decoded.bits, Some(uuid));
        assert_eq!(decoded.copies_expected, 5.0);
        assert_eq!(decoded.confidence, 1.0);
    }

    #[test]
    fn test_redundancy_is_clamped() {
        assert_eq!(Codec::new(0, "").redundancy(), 1);
        assert_eq!(Codec::new(1000, "").redundancy(), MAX_REDUNDANCY);
    }

    #[test]
    fn test_snap_to_word_end() {
        let chars: Vec<char> = "ab cd".chars().collect();
        assert_eq!(snap_to_word_end(&chars, 0), 2);
        assert_eq!(snap_to_word_end(&chars, 3), 2);
        assert_eq!(snap_to_word_end(&chars, 4), 5);
        let blank: Vec<char> = "   ".chars().collect();
        assert_eq!(snap_to_word_end(&blank, 1), 1);
    }
}
