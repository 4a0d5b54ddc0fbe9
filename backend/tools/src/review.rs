/// Confidence and human-review rules applied after extraction.
///
/// A model's self-reported scores are not trusted on their own: components
/// the reference store confirms are standardized and scored 1.0, and
/// components that differ from the source text without store confirmation
/// are capped below the review threshold.
use juso_core::{AddressComponent, AddressComponents, LOW_CONFIDENCE_THRESHOLD};

use crate::lookup::{AddressLookupStore, ComponentLookup, LookupQuery};

/// Highest confidence an unconfirmed alteration may carry.
pub const UNCONFIRMED_ALTERATION_CAP: f64 = 0.29;
pub const VALIDATED_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewPolicy {
    pub low_confidence_threshold: f64,
    /// Rewrite values and scores from store results. When off, only the
    /// review flag is computed.
    pub enforce_validation: bool,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
            enforce_validation: true,
        }
    }
}

impl ReviewPolicy {
    /// Standardize, rescore and flag `address` extracted from `source`.
    ///
    /// An empty `source` disables the alteration check.
    pub fn apply(
        &self,
        mut address: AddressComponents,
        source: &str,
        store: &AddressLookupStore,
    ) -> AddressComponents {
        let query = LookupQuery {
            sido: address.sido.clone(),
            sigungu: address.sigungu.clone(),
            road_name: address.road_name.clone(),
            building_number: address.building_number.clone(),
        };
        let lookup = store.lookup(&query);

        let checked: [(AddressComponent, Option<&ComponentLookup>); 3] = [
            (AddressComponent::Sido, lookup.sido.as_ref()),
            (AddressComponent::Sigungu, lookup.sigungu.as_ref()),
            (AddressComponent::RoadName, lookup.road_name.as_ref()),
        ];

        // District and road are required: missing counts as unvalidated
        // unless nothing was extracted at all.
        let has_any = !address.is_empty();
        let mut unvalidated_required = false;
        let mut validated = Vec::new();
        for (component, result) in checked {
            match result {
                Some(found) if found.is_validated() => {
                    validated.push(component);
                    if self.enforce_validation {
                        if let Some(standardized) = &found.standardized {
                            address.set(component, Some(standardized.clone()));
                        }
                        address.set_confidence(component, VALIDATED_CONFIDENCE);
                    }
                }
                _ if component == AddressComponent::Sido => {}
                Some(_) => unvalidated_required = true,
                None => unvalidated_required |= has_any,
            }
        }

        if self.enforce_validation && address.sido.is_none() {
            if let Some(sido) = lookup.inferred_sido {
                address.sido = Some(sido);
                address.set_confidence(AddressComponent::Sido, VALIDATED_CONFIDENCE);
                validated.push(AddressComponent::Sido);
            }
        }

        if self.enforce_validation && !source.trim().is_empty() {
            let haystack = compact(source);
            let altered: Vec<AddressComponent> = address
                .populated()
                .filter(|c| !validated.contains(c))
                .filter(|c| {
                    address
                        .get(*c)
                        .map(|v| !haystack.contains(&compact(v)))
                        .unwrap_or(false)
                })
                .collect();
            for component in altered {
                let capped = address
                    .confidence_of(component)
                    .unwrap_or(UNCONFIRMED_ALTERATION_CAP)
                    .min(UNCONFIRMED_ALTERATION_CAP);
                address.set_confidence(component, capped);
            }
        }

        address.human_review = address.human_review
            || unvalidated_required
            || address.has_unpaired_unit()
            || address.has_low_confidence(self.low_confidence_threshold);
        address
    }
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
