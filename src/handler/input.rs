//! Request body preparation ahead of parsing
//!
//! Invalid UTF-8 and lone surrogate escapes become U+FFFD, so documents that
//! are grammatically valid parse the way a lenient decoder would take them.
//! The same pass records the deepest array/object nesting seen outside
//! strings, which bounds the parser's recursion.

use std::borrow::Cow;

const REPLACEMENT_ESCAPE: &str = "\\ufffd";

/// Body text ready for the parser
#[derive(Debug)]
pub struct PreparedInput<'a> {
    pub text: Cow<'a, str>,
    /// Deepest nesting of `[`/`{` outside strings
    pub depth: usize,
}

pub fn prepare(body: &[u8]) -> PreparedInput<'_> {
    let text = String::from_utf8_lossy(body);
    let bytes = text.as_bytes();

    // Only allocated once a surrogate escape needs rewriting
    let mut rewritten: Option<String> = None;
    let mut copied = 0;
    let mut in_string = false;
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'"' => in_string = false,
                b'\\' => {
                    let Some(unit) = unicode_escape(bytes, i) else {
                        i += 2;
                        continue;
                    };
                    if is_high_surrogate(unit)
                        && unicode_escape(bytes, i + 6).is_some_and(is_low_surrogate)
                    {
                        i += 12;
                        continue;
                    }
                    if is_surrogate(unit) {
                        let out =
                            rewritten.get_or_insert_with(|| String::with_capacity(text.len()));
                        out.push_str(&text[copied..i]);
                        out.push_str(REPLACEMENT_ESCAPE);
                        copied = i + 6;
                    }
                    i += 6;
                    continue;
                }
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'[' | b'{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                b']' | b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        i += 1;
    }

    let text = match rewritten {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => text,
    };

    PreparedInput {
        text,
        depth: max_depth,
    }
}

/// Code unit of a `\uXXXX` escape starting at `at`
fn unicode_escape(bytes: &[u8], at: usize) -> Option<u16> {
    if bytes.get(at) != Some(&b'\\') || bytes.get(at + 1) != Some(&b'u') {
        return None;
    }
    let digits = bytes.get(at + 2..at + 6)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let digits = std::str::from_utf8(digits).ok()?;
    u16::from_str_radix(digits, 16).ok()
}

const fn is_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDFFF)
}

const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}

const fn is_low_surrogate(unit: u16) -> bool {
    matches!(unit, 0xDC00..=0xDFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_is_borrowed() {
        let input = prepare(r#"{"a": ["é", "😀"]}"#.as_bytes());
        assert!(matches!(input.text, Cow::Borrowed(_)));
        assert_eq!(input.depth, 2);
    }

    #[test]
    fn test_lone_surrogates_are_replaced() {
        assert_eq!(prepare(br#""\ud800""#).text, r#""\ufffd""#);
        assert_eq!(prepare(br#""\uDC00x""#).text, r#""\ufffdx""#);
        assert_eq!(prepare(br#""\ud800\u0041""#).text, r#""\ufffd\u0041""#);
        assert_eq!(prepare(br#"["\udc00\ud800"]"#).text, r#"["\ufffd\ufffd"]"#);
    }

    #[test]
    fn test_surrogate_pair_is_kept() {
        let input = prepare(br#""\ud83d\ude00""#);
        assert!(matches!(input.text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_escaped_backslash_is_not_an_escape() {
        let input = prepare(br#""\\ud800""#);
        assert_eq!(input.text, r#""\\ud800""#);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let input = prepare(b"\"\xff\xfe\"");
        assert_eq!(input.text, "\"\u{fffd}\u{fffd}\"");
    }

    #[test]
    fn test_depth_ignores_brackets_in_strings() {
        assert_eq!(prepare(br#"["[[[{", {"k": "}]"}]"#).depth, 2);
        assert_eq!(prepare(br#"["\"[[["]"#).depth, 1);
        assert_eq!(prepare(b"42").depth, 0);
    }

    #[test]
    fn test_depth_of_unbalanced_input() {
        let open = "[".repeat(300);
        assert_eq!(prepare(open.as_bytes()).depth, 300);
    }
}
