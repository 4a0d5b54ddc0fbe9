/// Reference store of known provinces, districts and roads.
///
/// The store is immutable after load and shared behind an `Arc`, so any
/// number of workers may read it concurrently.
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const EMBEDDED_FIXTURE: &str = include_str!("../data/address_fixture.json");

/// Maximum edit distance accepted as an OCR correction.
const MAX_CORRECTION_DISTANCE: usize = 1;
/// Inputs shorter than this are never fuzzy-corrected.
const MIN_CORRECTION_CHARS: usize = 3;
const MAX_SUGGESTIONS: usize = 3;
const SUGGESTION_DISTANCE: usize = 2;

static EMBEDDED: Lazy<Arc<AddressLookupStore>> = Lazy::new(|| {
    Arc::new(
        AddressLookupStore::from_json(EMBEDDED_FIXTURE).expect("embedded address fixture is valid"),
    )
});

static ROAD_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([가-힣\d]+?(?:로|길))\s*(\d+번?길)?$").unwrap());

#[derive(Debug, Clone, Deserialize)]
pub struct RoadRecord {
    pub standardized_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictRecord {
    pub standardized_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub roads: BTreeMap<String, RoadRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidoRecord {
    pub standardized_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub districts: BTreeMap<String, DistrictRecord>,
}

/// How a component was matched against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Exact,
    Alias,
    /// Matched a known name within the correction distance.
    Corrected,
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentLookup {
    pub input: String,
    pub standardized: Option<String>,
    pub status: LookupStatus,
}

impl ComponentLookup {
    pub fn is_validated(&self) -> bool {
        self.status != LookupStatus::Unconfirmed
    }

    fn unconfirmed(input: &str) -> Self {
        Self {
            input: input.to_string(),
            standardized: None,
            status: LookupStatus::Unconfirmed,
        }
    }
}

/// Components to check. All optional; absent ones are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub sido: Option<String>,
    #[serde(default)]
    pub sigungu: Option<String>,
    #[serde(default)]
    pub road_name: Option<String>,
    #[serde(default)]
    pub building_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LookupResult {
    pub sido: Option<ComponentLookup>,
    pub sigungu: Option<ComponentLookup>,
    pub road_name: Option<ComponentLookup>,
    /// Passed through unchecked; the store has no building registry.
    pub building_number: Option<String>,
    /// Province owning the matched district when none was given or confirmed.
    pub inferred_sido: Option<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AddressLookupStore {
    sidos: BTreeMap<String, SidoRecord>,
}

impl AddressLookupStore {
    pub fn from_json(json: &str) -> Result<Self> {
        let sidos: BTreeMap<String, SidoRecord> =
            serde_json::from_str(json).context("Failed to parse address lookup data")?;
        Ok(Self { sidos })
    }

    /// The compiled-in reference data.
    pub fn embedded() -> Arc<Self> {
        Arc::clone(&EMBEDDED)
    }

    pub fn sido_count(&self) -> usize {
        self.sidos.len()
    }

    pub fn lookup(&self, query: &LookupQuery) -> LookupResult {
        let mut result = LookupResult {
            building_number: non_blank(query.building_number.as_deref()).map(str::to_string),
            ..Default::default()
        };

        let mut sido_scope: Vec<&SidoRecord> = self.sidos.values().collect();
        if let Some(input) = non_blank(query.sido.as_deref()) {
            let entries = self
                .sidos
                .values()
                .map(|s| (s.standardized_name.as_str(), s.aliases.as_slice(), s));
            match resolve(input, entries) {
                Some((status, sido)) => {
                    sido_scope = vec![sido];
                    result.sido = Some(ComponentLookup {
                        input: input.to_string(),
                        standardized: Some(sido.standardized_name.clone()),
                        status,
                    });
                }
                None => result.sido = Some(ComponentLookup::unconfirmed(input)),
            }
        }

        let mut district_scope: Vec<&DistrictRecord> = sido_scope
            .iter()
            .flat_map(|s| s.districts.values())
            .collect();
        if let Some(input) = non_blank(query.sigungu.as_deref()) {
            let entries = sido_scope.iter().flat_map(|s| {
                s.districts
                    .values()
                    .map(move |d| (d.standardized_name.as_str(), d.aliases.as_slice(), (*s, d)))
            });
            match resolve(input, entries) {
                Some((status, (sido, district))) => {
                    district_scope = vec![district];
                    if !result.sido.as_ref().map(|s| s.is_validated()).unwrap_or(false) {
                        result.inferred_sido = Some(sido.standardized_name.clone());
                    }
                    result.sigungu = Some(ComponentLookup {
                        input: input.to_string(),
                        standardized: Some(district.standardized_name.clone()),
                        status,
                    });
                }
                None => {
                    result.suggestions.extend(suggest(
                        input,
                        district_scope.iter().map(|d| d.standardized_name.as_str()),
                    ));
                    result.sigungu = Some(ComponentLookup::unconfirmed(input));
                }
            }
        }

        if let Some(input) = non_blank(query.road_name.as_deref()) {
            let (head, tail) = split_road(input);
            let entries = district_scope
                .iter()
                .flat_map(|d| d.roads.values())
                .map(|r| (r.standardized_name.as_str(), r.aliases.as_slice(), r));
            match resolve(head, entries) {
                Some((status, road)) => {
                    let standardized = match tail {
                        Some(tail) => format!("{} {}", road.standardized_name, tail),
                        None => road.standardized_name.clone(),
                    };
                    result.road_name = Some(ComponentLookup {
                        input: input.to_string(),
                        standardized: Some(standardized),
                        status,
                    });
                }
                None => {
                    result.suggestions.extend(suggest(
                        head,
                        district_scope
                            .iter()
                            .flat_map(|d| d.roads.values())
                            .map(|r| r.standardized_name.as_str()),
                    ));
                    result.road_name = Some(ComponentLookup::unconfirmed(input));
                }
            }
        }

        result
    }
}

/// Exact name, then alias, then nearest name within the correction distance.
fn resolve<'a, T: Copy>(
    input: &str,
    entries: impl Iterator<Item = (&'a str, &'a [String], T)>,
) -> Option<(LookupStatus, T)> {
    let key = compact(input);
    let entries: Vec<(&str, &[String], T)> = entries.collect();

    if let Some((_, _, item)) = entries.iter().find(|(name, _, _)| compact(name) == key) {
        return Some((LookupStatus::Exact, *item));
    }
    if let Some((_, _, item)) = entries
        .iter()
        .find(|(_, aliases, _)| aliases.iter().any(|a| compact(a) == key))
    {
        return Some((LookupStatus::Alias, *item));
    }
    if key.chars().count() < MIN_CORRECTION_CHARS {
        return None;
    }
    entries
        .iter()
        .filter_map(|(name, aliases, item)| {
            std::iter::once(*name)
                .chain(aliases.iter().map(String::as_str))
                .map(|candidate| strsim::levenshtein(&key, &compact(candidate)))
                .min()
                .map(|distance| (distance, *item))
        })
        .filter(|(distance, _)| *distance <= MAX_CORRECTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, item)| (LookupStatus::Corrected, item))
}

fn suggest<'a>(input: &str, names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let key = compact(input);
    let mut scored: Vec<(usize, &str)> = names
        .map(|name| (strsim::levenshtein(&key, &compact(name)), name))
        .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
        .collect();
    scored.sort_by_key(|(distance, _)| *distance);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Split `화랑로 11길` into the base road and its numbered side-street suffix.
fn split_road(input: &str) -> (&str, Option<&str>) {
    let trimmed = input.trim();
    match ROAD_SPLIT_RE.captures(trimmed) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
            caps.get(2).map(|m| m.as_str()),
        ),
        None => (trimmed, None),
    }
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
