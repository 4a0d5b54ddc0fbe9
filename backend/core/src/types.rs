use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Confidence below this marks a component for human review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Confidence key used by synthesized placeholder entries.
pub const ERROR_CONFIDENCE_KEY: &str = "error";

/// Named components of a Korean road-name address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressComponent {
    Sido,
    Sigungu,
    RoadName,
    BuildingNumber,
    Dong,
    Ho,
    LegalDong,
    BuildingName,
    Floor,
}

impl AddressComponent {
    pub const ALL: [AddressComponent; 9] = [
        AddressComponent::Sido,
        AddressComponent::Sigungu,
        AddressComponent::RoadName,
        AddressComponent::BuildingNumber,
        AddressComponent::Dong,
        AddressComponent::Ho,
        AddressComponent::LegalDong,
        AddressComponent::BuildingName,
        AddressComponent::Floor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sido => "sido",
            Self::Sigungu => "sigungu",
            Self::RoadName => "road_name",
            Self::BuildingNumber => "building_number",
            Self::Dong => "dong",
            Self::Ho => "ho",
            Self::LegalDong => "legal_dong",
            Self::BuildingName => "building_name",
            Self::Floor => "floor",
        }
    }
}

impl fmt::Display for AddressComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured address with per-component confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddressComponents {
    #[serde(default)]
    pub sido: Option<String>,
    #[serde(default)]
    pub sigungu: Option<String>,
    #[serde(default)]
    pub road_name: Option<String>,
    #[serde(default)]
    pub building_number: Option<String>,
    #[serde(default)]
    pub dong: Option<String>,
    #[serde(default)]
    pub ho: Option<String>,
    #[serde(default)]
    pub legal_dong: Option<String>,
    #[serde(default)]
    pub building_name: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    /// Component name → confidence in [0, 1].
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    #[serde(default)]
    pub human_review: bool,
}

impl AddressComponents {
    /// Placeholder used when nothing could be extracted.
    pub fn unresolved() -> Self {
        Self {
            human_review: true,
            ..Self::default()
        }
    }

    pub fn get(&self, component: AddressComponent) -> Option<&str> {
        let value = match component {
            AddressComponent::Sido => &self.sido,
            AddressComponent::Sigungu => &self.sigungu,
            AddressComponent::RoadName => &self.road_name,
            AddressComponent::BuildingNumber => &self.building_number,
            AddressComponent::Dong => &self.dong,
            AddressComponent::Ho => &self.ho,
            AddressComponent::LegalDong => &self.legal_dong,
            AddressComponent::BuildingName => &self.building_name,
            AddressComponent::Floor => &self.floor,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, component: AddressComponent, value: Option<String>) {
        let slot = match component {
            AddressComponent::Sido => &mut self.sido,
            AddressComponent::Sigungu => &mut self.sigungu,
            AddressComponent::RoadName => &mut self.road_name,
            AddressComponent::BuildingNumber => &mut self.building_number,
            AddressComponent::Dong => &mut self.dong,
            AddressComponent::Ho => &mut self.ho,
            AddressComponent::LegalDong => &mut self.legal_dong,
            AddressComponent::BuildingName => &mut self.building_name,
            AddressComponent::Floor => &mut self.floor,
        };
        *slot = value;
    }

    pub fn confidence_of(&self, component: AddressComponent) -> Option<f64> {
        self.confidence.get(component.as_str()).copied()
    }

    pub fn set_confidence(&mut self, component: AddressComponent, value: f64) {
        self.confidence
            .insert(component.as_str().to_string(), value.clamp(0.0, 1.0));
    }

    /// Components that carry a non-blank value.
    pub fn populated(&self) -> impl Iterator<Item = AddressComponent> + '_ {
        AddressComponent::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.populated().next().is_none()
    }

    /// Exactly one of dong/ho is present.
    pub fn has_unpaired_unit(&self) -> bool {
        self.get(AddressComponent::Dong).is_some() != self.get(AddressComponent::Ho).is_some()
    }

    /// Any populated component scored below `threshold`.
    pub fn has_low_confidence(&self, threshold: f64) -> bool {
        self.populated()
            .filter_map(|c| self.confidence_of(c))
            .any(|score| score < threshold)
    }

    /// Render as a single-line Korean address:
    /// `sido sigungu road building dong ho (legal_dong, building_name)`.
    pub fn to_formatted_address(&self) -> String {
        let mut parts: Vec<String> = [
            AddressComponent::Sido,
            AddressComponent::Sigungu,
            AddressComponent::RoadName,
            AddressComponent::BuildingNumber,
            AddressComponent::Dong,
            AddressComponent::Ho,
        ]
        .into_iter()
        .filter_map(|c| self.get(c).map(str::to_string))
        .collect();

        match (
            self.get(AddressComponent::LegalDong),
            self.get(AddressComponent::BuildingName),
        ) {
            (Some(legal), Some(building)) => parts.push(format!("({legal}, {building})")),
            (Some(only), None) | (None, Some(only)) => parts.push(format!("({only})")),
            (None, None) => {}
        }

        parts.join(" ")
    }
}

/// Kind of phone number detected for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    Cellphone,
    Landline,
    Unknown,
}

impl PhoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cellphone => "cellphone",
            Self::Landline => "landline",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse of a model-produced label.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "cellphone" | "mobile" | "cell" | "휴대폰" | "핸드폰" => Self::Cellphone,
            "landline" | "phone" | "tel" | "일반전화" | "유선" => Self::Landline,
            _ => Self::Unknown,
        }
    }
}

/// One extracted contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContactEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub phone_type: Option<PhoneType>,
    #[serde(default)]
    pub address: AddressComponents,
    /// Field name (`name`, `phone`, `address`) → confidence.
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    /// 1-based, unique across a whole result.
    #[serde(default)]
    pub entry_number: u32,
    #[serde(default)]
    pub human_review: bool,
}

impl ContactEntry {
    /// Reviewable placeholder for a contact that could not be extracted.
    pub fn fallback(entry_number: u32) -> Self {
        let mut confidence = BTreeMap::new();
        confidence.insert(ERROR_CONFIDENCE_KEY.to_string(), 0.0);
        Self {
            name: None,
            phone_number: None,
            phone_type: None,
            address: AddressComponents::unresolved(),
            confidence,
            entry_number,
            human_review: true,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.confidence.get(ERROR_CONFIDENCE_KEY) == Some(&0.0)
    }
}

/// Ordered, numbered result of one multi-entry extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MultiEntryResult {
    #[serde(default)]
    pub entries: Vec<ContactEntry>,
    #[serde(default)]
    pub total_entries: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl MultiEntryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ContactEntry>) -> Self {
        let total_entries = entries.len();
        Self {
            entries,
            total_entries,
            processing_metadata: None,
            request_id: None,
        }
    }

    /// Copy of this result carrying request-scoped metadata. Entries are untouched.
    pub fn with_metadata(&self, metadata: serde_json::Value, request_id: impl Into<String>) -> Self {
        Self {
            entries: self.entries.clone(),
            total_entries: self.entries.len(),
            processing_metadata: Some(metadata),
            request_id: Some(request_id.into()),
        }
    }
}

/// Loose first-pass guess at one contact, as split from raw OCR text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "phone")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
}

impl RawContact {
    /// Text used for region classification: the address, else the raw line.
    pub fn location_text(&self) -> &str {
        self.address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .or(self.raw_text.as_deref())
            .unwrap_or("")
    }
}

/// Structured-output envelope for the initial split.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContactList {
    #[serde(default)]
    pub contacts: Vec<RawContact>,
}

/// How a batch was assembled by the geographic planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    LargeRegionFull,
    LargeRegionRemainder,
    SmallRegionComplete,
    MixedRegionsOptimized,
}

impl BatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LargeRegionFull => "large_region_full",
            Self::LargeRegionRemainder => "large_region_remainder",
            Self::SmallRegionComplete => "small_region_complete",
            Self::MixedRegionsOptimized => "mixed_regions_optimized",
        }
    }

    /// All contacts come from one region.
    pub fn is_single_region(&self) -> bool {
        !matches!(self, Self::MixedRegionsOptimized)
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of contacts sent to the LLM in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Region label, e.g. `서울` or `서울(5) + 부산(3) + 기타(2)`.
    pub region: String,
    pub contacts: Vec<RawContact>,
    pub batch_type: BatchType,
    /// First global entry number assigned to this batch (1-based).
    pub entry_offset: u32,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
