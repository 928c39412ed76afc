// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input normalization and validation for send requests, plus the
//! redaction helpers used when outcomes are written to the delivery log.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CourierError;

/// Maximum body length in characters (ten concatenated SMS segments).
pub const MAX_BODY_CHARS: usize = 1600;

/// Number of body characters kept in a delivery log preview.
pub const PREVIEW_CHARS: usize = 50;

/// E.164-style number: optional `+`, no leading zero, 7 to 15 digits.
static RECIPIENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{6,14}$").unwrap());

/// Trim a recipient, strip common formatting characters, and validate it.
///
/// Returns the normalized number on success.
pub fn normalize_recipient(raw: &str) -> Result<String, CourierError> {
    let normalized: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if normalized.is_empty() {
        return Err(CourierError::Validation("recipient is required".into()));
    }
    if !RECIPIENT_PATTERN.is_match(&normalized) {
        return Err(CourierError::Validation(format!(
            "recipient `{}` is not a valid phone number",
            raw.trim()
        )));
    }
    Ok(normalized)
}

/// Trim a message body and check it is non-empty and within the length cap.
pub fn normalize_body(raw: &str) -> Result<String, CourierError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(CourierError::Validation("message body is empty".into()));
    }
    let chars = body.chars().count();
    if chars > MAX_BODY_CHARS {
        return Err(CourierError::Validation(format!(
            "message body is {chars} characters, limit is {MAX_BODY_CHARS}"
        )));
    }
    Ok(body.to_string())
}

/// Normalize a caller identifier. Empty identifiers are rejected.
pub fn normalize_identifier(raw: &str) -> Result<String, CourierError> {
    let identifier = raw.trim();
    if identifier.is_empty() {
        return Err(CourierError::Validation("identifier is required".into()));
    }
    Ok(identifier.to_string())
}

/// Replace all but the last four characters with `*`.
///
/// Values of four characters or fewer are masked entirely.
pub fn mask_recipient(recipient: &str) -> String {
    let chars: Vec<char> = recipient.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible = chars.len() - 4;
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { *c })
        .collect()
}

/// First [`PREVIEW_CHARS`] characters of a body, with `...` when truncated.
pub fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recipient_is_trimmed_and_stripped() {
        assert_eq!(
            normalize_recipient("  +1 (555) 010-9999 ").unwrap(),
            "+15550109999"
        );
        assert_eq!(normalize_recipient("447700900123").unwrap(), "447700900123");
    }

    #[test]
    fn malformed_recipients_are_rejected() {
        for bad in ["", "   ", "+0123456789", "12345", "+1555abc0199", "+12345678901234567"] {
            let err = normalize_recipient(bad).unwrap_err();
            assert!(matches!(err, CourierError::Validation(_)), "{bad} should fail");
        }
    }

    #[test]
    fn body_rules() {
        assert_eq!(normalize_body("  hello  ").unwrap(), "hello");
        assert!(normalize_body(" \n\t ").is_err());
        assert!(normalize_body(&"x".repeat(MAX_BODY_CHARS)).is_ok());
        assert!(normalize_body(&"x".repeat(MAX_BODY_CHARS + 1)).is_err());
    }

    #[test]
    fn identifier_must_be_present() {
        assert_eq!(normalize_identifier(" tenant ").unwrap(), "tenant");
        assert!(normalize_identifier("").is_err());
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask_recipient("+15550109999"), "********9999");
        assert_eq!(mask_recipient("1234"), "****");
    }

    #[test]
    fn preview_truncates_long_bodies() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(60);
        let p = preview(&long);
        assert_eq!(p.len(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    proptest! {
        #[test]
        fn mask_preserves_length_and_suffix(s in "[0-9+]{5,20}") {
            let masked = mask_recipient(&s);
            prop_assert_eq!(masked.chars().count(), s.chars().count());
            prop_assert_eq!(&masked[masked.len() - 4..], &s[s.len() - 4..]);
            prop_assert!(masked[..masked.len() - 4].chars().all(|c| c == '*'));
        }

        #[test]
        fn preview_never_exceeds_cap(s in "\\PC{0,200}") {
            prop_assert!(preview(&s).chars().count() <= PREVIEW_CHARS + 3);
        }
    }
}
