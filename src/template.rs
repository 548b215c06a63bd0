//! Template keys for scroll continuity.
//!
//! Stat lines change every few ticks ("CPU: 42.0%" becomes "CPU: 57.3%"). If the
//! line is scrolling, restarting the marquee from the right edge on every value
//! change makes it unreadable. A template key strips out the volatile parts so
//! the marquee can tell "same line, new value" apart from "different line".
//!
//! # Rules
//!
//! The key is produced by a single left-to-right scan applying two rules in a
//! fixed order at each digit:
//!
//! 1. **Dotted quad**: `\d+\.\d+\.\d+\.\d+` becomes [`IP_PLACEHOLDER`].
//! 2. **Numeric run**: `\d+\.?\d*%?` becomes [`NUMBER_PLACEHOLDER`].
//!
//! The dotted-quad rule must be tried first. The numeric rule accepts one decimal
//! point, so running it first would split `10.0.0.1` into `10.0`, `.`, `0.1` and
//! produce `#.#`, after which the address can no longer be recognised.
//!
//! Keys never contain ASCII digits, which makes [`template_key`] idempotent.

use core::fmt;

/// Replacement for a numeric run (with optional fraction and percent sign).
pub const NUMBER_PLACEHOLDER: char = '#';

/// Replacement for a dotted-quad IPv4 address.
pub const IP_PLACEHOLDER: &str = "<ip>";

/// Normalized form of a line with volatile values replaced by placeholders.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TemplateKey(String);

impl TemplateKey {
    #[inline]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Compute the template key of `text`.
pub fn template_key(text: &str) -> TemplateKey {
    let bytes = text.as_bytes();
    let mut key = String::with_capacity(text.len());
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_digit() {
            if let Some(end) = match_dotted_quad(bytes, pos) {
                key.push_str(IP_PLACEHOLDER);
                pos = end;
            } else {
                key.push(NUMBER_PLACEHOLDER);
                pos = match_number(bytes, pos);
            }
        } else {
            // Copy everything up to the next digit. Digits are ASCII, so this
            // always splits on a char boundary.
            let next = bytes[pos..]
                .iter()
                .position(u8::is_ascii_digit)
                .map_or(bytes.len(), |offset| pos + offset);
            key.push_str(&text[pos..next]);
            pos = next;
        }
    }

    TemplateKey(key)
}

/// Whether a line changing from `old` to `new` should keep its scroll position.
///
/// False when either side is absent (first render, or a line being cleared).
pub fn is_continuous(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => template_key(old) == template_key(new),
        _ => false,
    }
}

/// Length of the ASCII digit run starting at `pos`.
fn digit_run(bytes: &[u8], pos: usize) -> usize {
    bytes.get(pos..).map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
}

/// End of a dotted quad starting at `pos`, if there is one.
fn match_dotted_quad(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    for group in 0..4 {
        if group > 0 {
            if bytes.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        }
        let run = digit_run(bytes, pos);
        if run == 0 {
            return None;
        }
        pos += run;
    }
    Some(pos)
}

/// End of the numeric run starting at `pos`.
fn match_number(bytes: &[u8], start: usize) -> usize {
    let mut pos = start + digit_run(bytes, start);
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        pos += digit_run(bytes, pos);
    }
    if bytes.get(pos) == Some(&b'%') {
        pos += 1;
    }
    pos
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_numbers_replaced() {
        assert_eq!(template_key("CPU: 42.0%").as_str(), "CPU: #");
        assert_eq!(template_key("Up:3h12m").as_str(), "Up:#h#m");
        assert_eq!(template_key("Mem:412M/3G 13%").as_str(), "Mem:#M/#G #");
    }

    #[test]
    fn test_ip_replaced_before_numbers() {
        assert_eq!(template_key("IP:10.0.0.1").as_str(), "IP:<ip>");
        assert_eq!(template_key("IP:192.168.100.254").as_str(), "IP:<ip>");
        // Numeric-first would have produced "IP:#.#"
        assert_ne!(template_key("IP:10.0.0.1").as_str(), "IP:#.#");
    }

    #[test]
    fn test_partial_ip_is_numeric() {
        assert_eq!(template_key("v1.2.3").as_str(), "v#.#");
        assert_eq!(template_key("1.2.3.4.5").as_str(), "<ip>.#");
    }

    #[test]
    fn test_no_digits_unchanged() {
        assert_eq!(template_key("raspberrypi").as_str(), "raspberrypi");
        assert_eq!(template_key("").as_str(), "");
        assert_eq!(template_key("Température: N/A").as_str(), "Température: N/A");
    }

    #[test]
    fn test_trailing_dot_consumed() {
        // `\d+\.?\d*` takes the dot even without a fraction
        assert_eq!(template_key("5. item").as_str(), "# item");
    }

    #[test]
    fn test_is_continuous() {
        assert!(is_continuous(Some("CPU: 42.0%"), Some("CPU: 57.3%")));
        assert!(is_continuous(Some("IP:10.0.0.1"), Some("IP:192.168.1.20")));
        assert!(is_continuous(Some("Up:1h59m"), Some("Up:2h0m")));
        assert!(!is_continuous(Some("CPU: 42.0%"), Some("Mem:412M/3G 13%")));
        assert!(!is_continuous(Some("IP:10.0.0.1"), Some("IP:10.0")));
    }

    #[test]
    fn test_is_continuous_absent() {
        assert!(!is_continuous(None, Some("CPU: 1%")));
        assert!(!is_continuous(Some("CPU: 1%"), None));
        assert!(!is_continuous(None, None));
    }

    fn layout_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[A-Za-z :/]{0,6}", 1..5)
    }

    proptest! {
        #[test]
        fn template_key_idempotent(text in "\\PC{0,40}") {
            let key = template_key(&text);
            prop_assert_eq!(template_key(key.as_str()), key);
        }

        #[test]
        fn template_key_has_no_digits(text in "\\PC{0,40}") {
            let key = template_key(&text);
            prop_assert!(!key.as_str().bytes().any(|b| b.is_ascii_digit()));
        }

        #[test]
        fn differing_numbers_are_continuous(
            layout in layout_strategy(),
            a in prop::collection::vec(0u32..100_000, 4),
            b in prop::collection::vec(0u32..100_000, 4),
        ) {
            // Separators contain no digits or dots, so each slot is exactly one run
            let render = |values: &[u32]| {
                layout
                    .iter()
                    .zip(values.iter().cycle())
                    .map(|(sep, v)| format!("{sep}{v}"))
                    .collect::<String>()
            };
            prop_assert!(is_continuous(Some(&render(&a)), Some(&render(&b))));
        }

        #[test]
        fn differing_addresses_are_continuous(
            a in any::<[u8; 4]>(),
            b in any::<[u8; 4]>(),
        ) {
            let old = format!("IP:{}.{}.{}.{}", a[0], a[1], a[2], a[3]);
            let new = format!("IP:{}.{}.{}.{}", b[0], b[1], b[2], b[3]);
            prop_assert!(is_continuous(Some(&old), Some(&new)));
        }
    }
}
