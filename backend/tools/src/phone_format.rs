/// Korean phone number detection and canonicalization.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use juso_core::PhoneType;

const CELLPHONE_CONFIDENCE: f64 = 0.95;
const LANDLINE_CONFIDENCE: f64 = 0.9;
const LABEL_BONUS: f64 = 0.05;
const PHONE_LABEL: &str = "전화번호";

static CELLPHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(01[016789])[-.\s]?(\d{3,4})[-.\s]?(\d{4})").unwrap());

static SEOUL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(?(02)\)?[-.\s]?(\d{3,4})[-.\s]?(\d{4})").unwrap());

static REGIONAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?(0(?:3[1-3]|4[1-4]|5[1-5]|6[1-4]))\)?[-.\s]?(\d{3,4})[-.\s]?(\d{4})").unwrap()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneMatch {
    /// Canonical `prefix-middle-last` form.
    pub number: String,
    /// The text as it appeared in the input.
    pub raw: String,
    pub phone_type: PhoneType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhoneFormatReport {
    pub phones_found: Vec<PhoneMatch>,
    pub total_phones: usize,
}

/// Find every cellphone and landline number in `text`.
///
/// Results are in pattern priority order (cellphones, then 02, then regional
/// codes), each pass in text order. A landline match overlapping an already
/// claimed span is dropped.
pub fn validate_phone_format(text: &str) -> PhoneFormatReport {
    let labelled = text.contains(PHONE_LABEL);
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut phones_found: Vec<PhoneMatch> = Vec::new();

    let passes: [(&Regex, PhoneType, f64); 3] = [
        (&CELLPHONE_RE, PhoneType::Cellphone, CELLPHONE_CONFIDENCE),
        (&SEOUL_RE, PhoneType::Landline, LANDLINE_CONFIDENCE),
        (&REGIONAL_RE, PhoneType::Landline, LANDLINE_CONFIDENCE),
    ];

    for (re, phone_type, base) in passes {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if !digit_bounded(text, start, end) {
                continue;
            }
            if claimed.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            claimed.push((start, end));
            let confidence = if labelled {
                (base + LABEL_BONUS).min(1.0)
            } else {
                base
            };
            phones_found.push(PhoneMatch {
                number: canonical(&caps),
                raw: whole.as_str().to_string(),
                phone_type,
                confidence,
            });
        }
    }

    PhoneFormatReport {
        total_phones: phones_found.len(),
        phones_found,
    }
}

/// Type of a single number string; `Unknown` when it is not a Korean number.
pub fn classify_phone(number: &str) -> PhoneType {
    validate_phone_format(number)
        .phones_found
        .first()
        .map(|m| m.phone_type)
        .unwrap_or(PhoneType::Unknown)
}

/// Canonical dashed form of a single number string.
pub fn canonicalize_phone(number: &str) -> Option<String> {
    validate_phone_format(number)
        .phones_found
        .into_iter()
        .next()
        .map(|m| m.number)
}

fn canonical(caps: &Captures<'_>) -> String {
    let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
    format!("{}-{}-{}", part(1), part(2), part(3))
}

fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(|c| c.is_ascii_digit()).unwrap_or(false)
        && !after.map(|c| c.is_ascii_digit()).unwrap_or(false)
}
