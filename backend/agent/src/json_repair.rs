//! Best-effort JSON recovery for model output.
//!
//! Three tiers, tried in order: direct parse, a fixed sequence of regex
//! repairs over the whole text, then the same repairs over the largest
//! bracket-delimited regions. Never fails loudly; callers get a tagged outcome.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static ADJACENT_CONTAINERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([}\]])\s*([{\[])").unwrap());
static BARE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());
static SINGLE_QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'([^'"]*)'"#).unwrap());
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
static LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([:\[,]\s*)(None|True|False|NULL|Null)(\s*[,}\]])").unwrap()
});
static ARRAY_REGION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static OBJECT_REGION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMethod {
    DirectParse,
    BasicRepair,
    AggressiveRepair,
    RepairFailed,
}

impl RepairMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectParse => "direct_parse",
            Self::BasicRepair => "basic_repair",
            Self::AggressiveRepair => "aggressive_repair",
            Self::RepairFailed => "repair_failed",
        }
    }
}

impl fmt::Display for RepairMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Parsed { value: Value, method: RepairMethod },
    Failed,
}

impl RepairOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }

    pub fn method(&self) -> RepairMethod {
        match self {
            Self::Parsed { method, .. } => *method,
            Self::Failed => RepairMethod::RepairFailed,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Parsed { value, .. } => Some(value),
            Self::Failed => None,
        }
    }
}

/// Parse `text` as JSON, repairing it if needed.
pub fn parse_with_repair(text: &str) -> RepairOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return RepairOutcome::Parsed {
            value,
            method: RepairMethod::DirectParse,
        };
    }

    if let Ok(value) = serde_json::from_str::<Value>(repair_json(text).trim()) {
        return RepairOutcome::Parsed {
            value,
            method: RepairMethod::BasicRepair,
        };
    }

    let mut candidates: Vec<&str> = [&*ARRAY_REGION_RE, &*OBJECT_REGION_RE]
        .into_iter()
        .filter_map(|re| re.find(text))
        .map(|m| m.as_str())
        .collect();
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    for candidate in candidates {
        if let Ok(value) = serde_json::from_str::<Value>(&repair_json(candidate)) {
            return RepairOutcome::Parsed {
                value,
                method: RepairMethod::AggressiveRepair,
            };
        }
    }

    RepairOutcome::Failed
}

/// Apply the structural repair sequence once.
pub fn repair_json(text: &str) -> String {
    let mut repaired = ADJACENT_CONTAINERS_RE
        .replace_all(text, "$1,$2")
        .into_owned();
    repaired = BARE_KEY_RE
        .replace_all(&repaired, r#"$1"$2":"#)
        .into_owned();
    repaired = SINGLE_QUOTED_RE
        .replace_all(&repaired, r#""$1""#)
        .into_owned();
    repaired = TRAILING_COMMA_RE.replace_all(&repaired, "$1").into_owned();

    // Matches share delimiters, so `[None, None]` needs more than one pass.
    loop {
        let next = LITERAL_RE
            .replace_all(&repaired, |caps: &regex::Captures<'_>| {
                let literal = match &caps[2] {
                    "True" => "true",
                    "False" => "false",
                    _ => "null",
                };
                format!("{}{}{}", &caps[1], literal, &caps[3])
            })
            .into_owned();
        if next == repaired {
            break;
        }
        repaired = next;
    }

    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_is_unchanged() {
        let text = r#"{"entries": [{"name": "홍길동", "entry_number": 1}], "total_entries": 1}"#;
        let outcome = parse_with_repair(text);
        assert_eq!(outcome.method(), RepairMethod::DirectParse);
        assert_eq!(
            outcome.into_value().unwrap(),
            serde_json::from_str::<Value>(text).unwrap()
        );
    }

    #[test]
    fn test_missing_comma_between_objects() {
        let outcome = parse_with_repair(r#"{"entries": [{"name":"테스트1"}{"name":"테스트2"}]}"#);
        assert_eq!(outcome.method(), RepairMethod::BasicRepair);
        let value = outcome.into_value().unwrap();
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][1]["name"], "테스트2");
    }

    #[test]
    fn test_python_style_literals() {
        let outcome = parse_with_repair("{'name': '김철수', 'phone': None, 'ok': True, 'x': [None, False],}");
        assert!(outcome.success());
        assert_eq!(
            outcome.into_value().unwrap(),
            json!({"name": "김철수", "phone": null, "ok": true, "x": [null, false]})
        );
    }

    #[test]
    fn test_bare_keys() {
        let value = parse_with_repair("{name: \"a\", entry_number: 2}")
            .into_value()
            .unwrap();
        assert_eq!(value, json!({"name": "a", "entry_number": 2}));
    }

    #[test]
    fn test_preamble_needs_aggressive_repair() {
        let text = "Here are the results:\n[{\"name\": \"a\"},]\nLet me know if you need more.";
        let outcome = parse_with_repair(text);
        assert_eq!(outcome.method(), RepairMethod::AggressiveRepair);
        assert_eq!(outcome.into_value().unwrap(), json!([{"name": "a"}]));
    }

    #[test]
    fn test_prose_fails_without_panicking() {
        let outcome = parse_with_repair("I could not find any contacts in this text.");
        assert!(!outcome.success());
        assert_eq!(outcome.method(), RepairMethod::RepairFailed);
        assert_eq!(outcome.method().to_string(), "repair_failed");
    }

    #[test]
    fn test_truncated_output_fails() {
        assert!(!parse_with_repair(r#"{"entries": [{"name": "a""#).success());
    }
}
