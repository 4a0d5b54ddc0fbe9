//! Prompt text for each agent role.

use std::fmt::Write;
use std::sync::Arc;

use juso_core::{Batch, Tool, ToolName};
use juso_planner::{classify_region, full_region_name, OTHER_REGION};

const ADDRESS_RULES: &str = "\
Korean road-name address format:
  시·도 + 시·군·구 + 도로명 + 건물번호 [동] [호수] (법정동명, 건물명)
Required components: sido (시·도), sigungu (시·군·구), road_name (도로명), building_number (건물번호)
Optional components: dong (동), ho (호), legal_dong (법정동), building_name (건물명), floor (층)

Confidence rules (0.0 to 1.0 per component):
- A component confirmed by lookup_address_components scores 1.0.
- Any change you make that the lookup cannot confirm must score below 0.3.
  Example: 자극로 -> 자곡로 confirmed by lookup: 1.0. 20이동 -> 20동 not confirmable: at most 0.29.

Set human_review to true when:
- any component scores below 0.3
- sigungu or road_name was not confirmed by lookup_address_components
- only one of dong / ho is present (e.g. 303호 without a 동, or 209동 without a 호)";

const ENTRY_SCHEMA: &str = r#"{
  "entries": [
    {
      "name": "홍길동",
      "phone_number": "010-1234-5678",
      "phone_type": "cellphone",
      "address": {
        "sido": "서울특별시", "sigungu": "강남구", "road_name": "테헤란로",
        "building_number": "123", "dong": null, "ho": null,
        "legal_dong": "역삼동", "building_name": null, "floor": null,
        "confidence": {"sido": 1.0, "sigungu": 1.0, "road_name": 1.0, "building_number": 0.9},
        "human_review": false
      },
      "confidence": {"name": 0.95, "phone": 0.95, "address": 0.9},
      "entry_number": 1,
      "human_review": false
    }
  ],
  "total_entries": 1
}"#;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn initial_split_system() -> String {
        "You split noisy OCR text from scanned Korean documents into individual contacts. \
         Each contact usually has a name, a phone number and an address, but any of them may be \
         missing. Do not correct or normalize anything; copy the text as it appears.\n\n\
         Respond with a JSON array only, one object per contact, in document order:\n\
         [{\"name\": \"...\", \"phone_number\": \"...\", \"address\": \"...\", \"raw_text\": \"...\"}]\n\
         Use null for missing fields. raw_text is the full OCR fragment the contact came from. \
         If there are no contacts, respond with []."
            .to_string()
    }

    pub fn multi_entry_system() -> String {
        format!(
            "You are a specialist in correcting Korean contact records extracted by OCR.\n\
             For every contact you receive, extract the name, the phone number (canonical dashed \
             form, with phone_type cellphone, landline or unknown) and the address components, \
             correcting OCR errors.\n\n\
             {ADDRESS_RULES}\n\n\
             Return exactly one entry per input contact, in input order, as a single JSON object:\n\
             {ENTRY_SCHEMA}"
        )
    }

    pub fn single_address_system() -> String {
        format!(
            "You are a specialized agent for analyzing and correcting Korean addresses extracted \
             from OCR.\n\
             Workflow:\n\
             1. Validate the address format and identify its components.\n\
             2. Check sido, sigungu and road_name with lookup_address_components.\n\
             3. Apply the corrections the lookup confirms.\n\
             4. Score each component and return the corrected address.\n\n\
             {ADDRESS_RULES}\n\n\
             Respond with a single JSON object with the fields sido, sigungu, road_name, \
             building_number, dong, ho, legal_dong, building_name, floor, confidence, human_review."
        )
    }

    /// Tool catalogue and call protocol, appended to a system prompt.
    pub fn tool_section(tools: &[(ToolName, Arc<dyn Tool>)]) -> String {
        if tools.is_empty() {
            return String::new();
        }
        let mut section = String::from(
            "\n\nTOOLS\nYou may call a tool by replying with one or more blocks of the form\n\
             <tool_call>{\"name\": \"<tool name>\", \"arguments\": {...}}</tool_call>\n\
             and nothing else. Results come back in <tool_result> blocks. When you are done, \
             reply with the final answer and no tool_call blocks.\n",
        );
        for (name, tool) in tools {
            let _ = writeln!(
                section,
                "- {}: {}\n  parameters: {}",
                name,
                tool.description(),
                tool.parameters()
            );
        }
        section
    }

    pub fn initial_split_prompt(text: &str) -> String {
        format!("Split this OCR text into contacts:\n\n{text}")
    }

    /// Prompt for one batch, with a regional hint.
    pub fn batch_prompt(batch: &Batch, index: usize, total: usize) -> String {
        let mut prompt = format!(
            "Batch {index} of {total} (region: {}). Extract and correct the following {} contacts.\n",
            batch.region,
            batch.len()
        );

        prompt.push_str(&Self::region_hint(batch));
        prompt.push('\n');

        for (i, contact) in batch.contacts.iter().enumerate() {
            let _ = writeln!(prompt, "\nContact {}:", i + 1);
            let fields = [
                ("name", &contact.name),
                ("phone", &contact.phone_number),
                ("address", &contact.address),
                ("raw_text", &contact.raw_text),
            ];
            for (label, value) in fields {
                if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                    let _ = writeln!(prompt, "  {label}: {value}");
                }
            }
        }

        let _ = write!(
            prompt,
            "\nReturn a JSON object with an \"entries\" array of exactly {} entries, numbered \
             1 to {} in the order above.",
            batch.len(),
            batch.len()
        );
        prompt
    }

    pub fn single_address_prompt(text: &str) -> String {
        format!(
            "Please analyze and correct this Korean address extracted from OCR: \"{text}\"\n\
             Use validate_korean_address_format to identify components, then \
             lookup_address_components to validate and correct them."
        )
    }

    /// Ask the structured-output call to restate a previous answer.
    pub fn restructure_prompt(raw_output: &str) -> String {
        format!(
            "Convert the following answer into the requested JSON structure without changing \
             its content:\n\n{raw_output}"
        )
    }

    fn region_hint(batch: &Batch) -> String {
        let mut regions: Vec<&'static str> = Vec::new();
        for contact in &batch.contacts {
            let region = classify_region(contact.location_text());
            if !regions.contains(&region) {
                regions.push(region);
            }
        }

        let named: Vec<&'static str> = regions.iter().filter_map(|r| full_region_name(r)).collect();
        match (batch.batch_type.is_single_region(), named.as_slice()) {
            (true, [province]) => format!(
                "All contacts in this batch are located in {province}. Prefer districts and roads \
                 of {province} when correcting OCR errors."
            ),
            (_, []) => "The contacts' provinces could not be determined; rely on the lookup tool."
                .to_string(),
            _ => {
                let mut hint = format!(
                    "This batch mixes contacts from several provinces: {}.",
                    named.join(", ")
                );
                if regions.contains(&OTHER_REGION) {
                    hint.push_str(" Some contacts have no recognizable province.");
                }
                hint.push_str(" Correct each address within its own province.");
                hint
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juso_core::{BatchType, RawContact};

    fn contact(address: &str) -> RawContact {
        RawContact {
            name: Some("홍길동".into()),
            phone_number: Some("010-1234-5678".into()),
            address: Some(address.into()),
            raw_text: None,
        }
    }

    #[test]
    fn test_single_region_hint() {
        let batch = Batch {
            region: "부산".into(),
            contacts: vec![contact("부산 해운대구 해운대로 570")],
            batch_type: BatchType::SmallRegionComplete,
            entry_offset: 1,
        };
        let prompt = PromptBuilder::batch_prompt(&batch, 2, 3);
        assert!(prompt.starts_with("Batch 2 of 3 (region: 부산)"));
        assert!(prompt.contains("located in 부산광역시"));
        assert!(prompt.contains("Contact 1:\n  name: 홍길동"));
        assert!(!prompt.contains("raw_text"));
    }

    #[test]
    fn test_mixed_region_hint_lists_provinces() {
        let batch = Batch {
            region: "서울(1) + 경기(1)".into(),
            contacts: vec![contact("서울 강남구"), contact("경기도 성남시")],
            batch_type: BatchType::MixedRegionsOptimized,
            entry_offset: 11,
        };
        let prompt = PromptBuilder::batch_prompt(&batch, 1, 1);
        assert!(prompt.contains("서울특별시, 경기도"));
        assert!(prompt.contains("exactly 2 entries"));
    }

    #[test]
    fn test_tool_section_empty_without_tools() {
        assert!(PromptBuilder::tool_section(&[]).is_empty());
    }

    #[test]
    fn test_multi_entry_system_mentions_rules() {
        let prompt = PromptBuilder::multi_entry_system();
        assert!(prompt.contains("below 0.3"));
        assert!(prompt.contains("\"entries\""));
    }
}
