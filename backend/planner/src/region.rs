/// Province classification of free-text addresses.
use once_cell::sync::Lazy;
use regex::Regex;

/// Bucket for addresses matching no province pattern.
pub const OTHER_REGION: &str = "기타";

/// A first-level division the planner groups by.
#[derive(Debug)]
pub struct Region {
    /// Short label used in batch names, e.g. `서울`.
    pub label: &'static str,
    /// Official name, used in prompts.
    pub full_name: &'static str,
    pattern: Regex,
}

impl Region {
    fn new(label: &'static str, full_name: &'static str, pattern: &str) -> Self {
        Self {
            label,
            full_name,
            pattern: Regex::new(pattern).unwrap(),
        }
    }
}

/// Ordered; the first matching pattern wins.
static REGIONS: Lazy<Vec<Region>> = Lazy::new(|| {
    vec![
        Region::new("서울", "서울특별시", r"서울"),
        Region::new("부산", "부산광역시", r"부산"),
        Region::new("대구", "대구광역시", r"대구"),
        Region::new("인천", "인천광역시", r"인천"),
        Region::new("광주", "광주광역시", r"광주광역시|광주시"),
        Region::new("대전", "대전광역시", r"대전"),
        Region::new("울산", "울산광역시", r"울산"),
        Region::new("세종", "세종특별자치시", r"세종특별자치시|세종시"),
        Region::new("경기", "경기도", r"경기"),
        Region::new("강원", "강원특별자치도", r"강원"),
        Region::new("충북", "충청북도", r"충청북도|충북"),
        Region::new("충남", "충청남도", r"충청남도|충남"),
        Region::new("전북", "전북특별자치도", r"전라북도|전북"),
        Region::new("전남", "전라남도", r"전라남도|전남"),
        Region::new("경북", "경상북도", r"경상북도|경북"),
        Region::new("경남", "경상남도", r"경상남도|경남"),
        Region::new("제주", "제주특별자치도", r"제주"),
    ]
});

/// Region label for an address, or [`OTHER_REGION`].
pub fn classify_region(address: &str) -> &'static str {
    REGIONS
        .iter()
        .find(|r| r.pattern.is_match(address))
        .map(|r| r.label)
        .unwrap_or(OTHER_REGION)
}

/// Official province name for a region label.
pub fn full_region_name(label: &str) -> Option<&'static str> {
    REGIONS.iter().find(|r| r.label == label).map(|r| r.full_name)
}
