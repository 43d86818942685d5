//! Masking of detected values. Raw matches never leave the guardian.

/// Which end of a value stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStyle {
    KeepPrefix(usize),
    KeepSuffix(usize),
}

impl MaskStyle {
    /// Card numbers, SSNs, dates: last four.
    pub const NUMBER: MaskStyle = MaskStyle::KeepSuffix(4);
    /// Keys and passwords: first four.
    pub const CREDENTIAL: MaskStyle = MaskStyle::KeepPrefix(4);
    pub const EMAIL: MaskStyle = MaskStyle::KeepPrefix(1);
    /// People and organizations: initial only.
    pub const NAME: MaskStyle = MaskStyle::KeepPrefix(1);
    pub const FULL: MaskStyle = MaskStyle::KeepPrefix(0);
}

/// Replace alphanumerics with `*`, keeping separators and at most a third
/// of the alphanumerics at the end selected by `style`.
pub fn mask(value: &str, style: MaskStyle) -> String {
    let total = value.chars().filter(|c| c.is_alphanumeric()).count();
    let (keep, from_end) = match style {
        MaskStyle::KeepPrefix(n) => (n, false),
        MaskStyle::KeepSuffix(n) => (n, true),
    };
    let reveal = keep.min(total / 3);

    let mut seen = 0usize;
    value
        .chars()
        .map(|c| {
            if !c.is_alphanumeric() {
                return c;
            }
            let index = seen;
            seen += 1;
            let visible = if from_end {
                index >= total - reveal
            } else {
                index < reveal
            };
            if visible {
                c
            } else {
                '*'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_keeps_last_four() {
        assert_eq!(mask("4111 1111 1111 1111", MaskStyle::NUMBER), "**** **** **** 1111");
    }

    #[test]
    fn test_short_values_reveal_at_most_a_third() {
        assert_eq!(mask("123-45-6789", MaskStyle::NUMBER), "***-**-*789");
        assert_eq!(mask("hunter2", MaskStyle::CREDENTIAL), "hu*****");
        assert_eq!(mask("ab", MaskStyle::CREDENTIAL), "**");
    }

    #[test]
    fn test_email_keeps_first_character() {
        assert_eq!(mask("alice@example.com", MaskStyle::EMAIL), "a****@*******.***");
    }

    #[test]
    fn test_full_mask() {
        assert_eq!(mask("221 Baker Street", MaskStyle::FULL), "*** ***** ******");
    }
}
