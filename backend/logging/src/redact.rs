//! Log Redaction Layer
//!
//! Scrubs API keys, access tokens, and phone numbers from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static KOREAN_MOBILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"01[016789][-.\s]?\d{3,4}[-.\s]?\d{4}").unwrap());
static KOREAN_LANDLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?0(?:2|[3-6]\d)\)?[-.\s]?\d{3,4}[-.\s]?\d{4}").unwrap());
static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9\-]{20,})|(up_[a-zA-Z0-9]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)")
        .unwrap()
});

const REDACTED_PHONE: &str = "[REDACTED_PHONE]";

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Tokens first; keys can contain digit runs that look like phone numbers.
    let mut redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]").to_string();

    for re in [&*KOREAN_MOBILE_RE, &*KOREAN_LANDLINE_RE, &*TELEPHONE_RE] {
        redacted = re.replace_all(&redacted, REDACTED_PHONE).to_string();
    }

    redacted
}

/// Redacted, character-bounded excerpt for log lines.
pub fn redacted_preview(input: &str, max_chars: usize) -> String {
    let redacted = redact_sensitive_data(input);
    if redacted.chars().count() <= max_chars {
        return redacted;
    }
    let mut preview: String = redacted.chars().take(max_chars).collect();
    preview.push('…');
    preview
}
