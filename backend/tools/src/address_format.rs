/// Korean address component detection by pattern.
///
/// Each component has its own regex and is searched independently; the first
/// acceptable match wins. Used both as a cheap signal and as the
/// `validate_korean_address_format` tool.
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use juso_core::{AddressComponent, AddressComponents};

/// Confidence reported for a matched component.
pub const MATCHED_CONFIDENCE: f64 = 0.9;
/// Confidence reported for a component with no match.
pub const UNMATCHED_CONFIDENCE: f64 = 0.1;

static SIDO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        "(서울특별시|부산광역시|대구광역시|인천광역시|광주광역시|대전광역시|울산광역시|",
        "세종특별자치시|경기도|강원특별자치도|강원도|충청북도|충청남도|전북특별자치도|전라북도|",
        "전라남도|경상북도|경상남도|제주특별자치도|",
        "서울시|부산시|대구시|인천시|광주시|대전시|울산시|세종시)"
    ))
    .unwrap()
});

static SIGUNGU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([가-힣]+(?:구|시|군))").unwrap());

static ROAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([가-힣\d]+(?:로|길)(?:\s*\d+번?길)?)").unwrap());

static BUILDING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:-\d+)?)").unwrap());

static DONG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+동)").unwrap());

static HO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+호)").unwrap());

static LEGAL_DONG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([가-힣]+동)").unwrap());

static BUILDING_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([가-힣A-Za-z0-9]+(?:아파트|빌딩|타워|맨션|빌라|오피스텔|스퀘어))").unwrap()
});

static FLOOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+층)").unwrap());

/// Result of searching for one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentMatch {
    pub found: bool,
    pub value: Option<String>,
    pub confidence: f64,
}

impl ComponentMatch {
    fn from_value(value: Option<String>) -> Self {
        match value {
            Some(v) => Self {
                found: true,
                value: Some(v),
                confidence: MATCHED_CONFIDENCE,
            },
            None => Self {
                found: false,
                value: None,
                confidence: UNMATCHED_CONFIDENCE,
            },
        }
    }
}

/// Per-component match report, keyed by component.
pub type AddressFormatReport = BTreeMap<AddressComponent, ComponentMatch>;

/// Detect every address component in `text`.
pub fn validate_address_format(text: &str) -> AddressFormatReport {
    AddressComponent::ALL
        .into_iter()
        .map(|component| (component, ComponentMatch::from_value(find_component(text, component))))
        .collect()
}

/// Pattern-only decomposition of an address string, matched components
/// scored [`MATCHED_CONFIDENCE`].
pub fn components_from_text(text: &str) -> AddressComponents {
    let mut address = AddressComponents::default();
    for (component, found) in validate_address_format(text) {
        if let Some(value) = found.value {
            address.set(component, Some(value));
            address.set_confidence(component, found.confidence);
        }
    }
    address
}

/// First acceptable match for a single component.
pub fn find_component(text: &str, component: AddressComponent) -> Option<String> {
    match component {
        AddressComponent::Sido => first_capture(&SIDO_RE, text),
        AddressComponent::Sigungu => SIGUNGU_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|candidate| !is_sido_name(candidate))
            .map(str::to_string),
        AddressComponent::RoadName => ROAD_RE
            .find_iter(text)
            .find(|m| !next_char_is_hangul(text, m.end()))
            .map(|m| m.as_str().to_string()),
        AddressComponent::BuildingNumber => BUILDING_NUMBER_RE
            .find_iter(text)
            .find(|m| is_standalone_number(text, m.start(), m.end()))
            .map(|m| m.as_str().to_string()),
        AddressComponent::Dong => first_capture(&DONG_RE, text),
        AddressComponent::Ho => first_capture(&HO_RE, text),
        AddressComponent::LegalDong => first_capture(&LEGAL_DONG_RE, text),
        AddressComponent::BuildingName => first_capture(&BUILDING_NAME_RE, text),
        AddressComponent::Floor => first_capture(&FLOOR_RE, text),
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_sido_name(candidate: &str) -> bool {
    SIDO_RE
        .find(candidate)
        .map(|m| m.start() == 0 && m.end() == candidate.len())
        .unwrap_or(false)
}

fn next_char_is_hangul(text: &str, end: usize) -> bool {
    text[end..].chars().next().map(is_hangul).unwrap_or(false)
}

/// A number not glued to a unit suffix (`11길`, `103동`) or to more digits.
fn is_standalone_number(text: &str, start: usize, end: usize) -> bool {
    let prev_ok = text[..start]
        .chars()
        .next_back()
        .map(|c| !c.is_ascii_digit() && c != '-')
        .unwrap_or(true);
    let next_ok = text[end..]
        .chars()
        .next()
        .map(|c| !c.is_ascii_digit() && c != '-' && !is_hangul(c))
        .unwrap_or(true);
    prev_ok && next_ok
}

fn is_hangul(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(report: &AddressFormatReport, c: AddressComponent) -> Option<&str> {
        report[&c].value.as_deref()
    }

    #[test]
    fn test_full_address_components() {
        let report =
            validate_address_format("서울특별시 성북구 화랑로 11길 26 103동 1602호 (하월곡동, OO아파트)");
        assert_eq!(value(&report, AddressComponent::Sido), Some("서울특별시"));
        assert_eq!(value(&report, AddressComponent::Sigungu), Some("성북구"));
        assert_eq!(value(&report, AddressComponent::RoadName), Some("화랑로 11길"));
        assert_eq!(value(&report, AddressComponent::BuildingNumber), Some("26"));
        assert_eq!(value(&report, AddressComponent::Dong), Some("103동"));
        assert_eq!(value(&report, AddressComponent::Ho), Some("1602호"));
        assert_eq!(value(&report, AddressComponent::LegalDong), Some("하월곡동"));
        assert_eq!(value(&report, AddressComponent::BuildingName), Some("OO아파트"));
        assert_eq!(report[&AddressComponent::Sido].confidence, MATCHED_CONFIDENCE);
    }

    #[test]
    fn test_missing_components_are_low_confidence() {
        let report = validate_address_format("부산광역시 해운대구 해운대로 570");
        assert_eq!(value(&report, AddressComponent::RoadName), Some("해운대로"));
        assert_eq!(value(&report, AddressComponent::BuildingNumber), Some("570"));
        let ho = &report[&AddressComponent::Ho];
        assert!(!ho.found);
        assert_eq!(ho.confidence, UNMATCHED_CONFIDENCE);
    }

    #[test]
    fn test_numbered_side_street() {
        let report = validate_address_format("인천광역시 남동구 구월로 273번길 15");
        assert_eq!(value(&report, AddressComponent::Sigungu), Some("남동구"));
        assert_eq!(value(&report, AddressComponent::RoadName), Some("구월로 273번길"));
        assert_eq!(value(&report, AddressComponent::BuildingNumber), Some("15"));
    }

    #[test]
    fn test_district_name_is_not_a_road() {
        let report = validate_address_format("서울특별시 종로구 세종대로 175");
        assert_eq!(value(&report, AddressComponent::Sigungu), Some("종로구"));
        assert_eq!(value(&report, AddressComponent::RoadName), Some("세종대로"));
    }

    #[test]
    fn test_components_from_text() {
        let address = components_from_text("부산광역시 해운대구 해운대로 570");
        assert_eq!(address.sigungu.as_deref(), Some("해운대구"));
        assert_eq!(address.confidence_of(AddressComponent::RoadName), Some(MATCHED_CONFIDENCE));
        assert!(address.ho.is_none());
        assert!(address.confidence_of(AddressComponent::Ho).is_none());
    }

    #[test]
    fn test_floor_detection() {
        let report = validate_address_format("경기도 성남시 분당구 판교역로 235 에이치스퀘어 N동 5층");
        assert_eq!(value(&report, AddressComponent::Floor), Some("5층"));
        assert_eq!(value(&report, AddressComponent::Sigungu), Some("성남시"));
        assert_eq!(value(&report, AddressComponent::BuildingName), Some("에이치스퀘어"));
    }
}
