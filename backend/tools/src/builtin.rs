use std::sync::Arc;

use async_trait::async_trait;
use juso_core::{Tool, ToolName, ToolRegistry};
use serde_json::{json, Value};

use crate::address_format::validate_address_format;
use crate::lookup::{AddressLookupStore, LookupQuery};
use crate::phone_format::validate_phone_format;

pub struct AddressFormatTool;

#[async_trait]
impl Tool for AddressFormatTool {
    fn name(&self) -> &str {
        ToolName::ValidateKoreanAddressFormat.as_str()
    }

    fn description(&self) -> &str {
        "Identify Korean address components (sido, sigungu, road_name, building_number, dong, ho, \
         legal_dong, building_name, floor) in a piece of text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text that may contain a Korean address"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let text = text_arg(&args)?;
        Ok(serde_json::to_value(validate_address_format(text))?)
    }
}

pub struct AddressLookupTool {
    store: Arc<AddressLookupStore>,
}

impl AddressLookupTool {
    pub fn new(store: Arc<AddressLookupStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddressLookupTool {
    fn name(&self) -> &str {
        ToolName::LookupAddressComponents.as_str()
    }

    fn description(&self) -> &str {
        "Check sido, sigungu and road_name against the reference address database. Returns the \
         standardized name and match status for each, plus suggestions for unknown names."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sido": { "type": "string", "description": "Province or metropolitan city, e.g. 서울특별시" },
                "sigungu": { "type": "string", "description": "District, e.g. 강남구" },
                "road_name": { "type": "string", "description": "Road name, e.g. 테헤란로" },
                "building_number": { "type": "string", "description": "Building number, e.g. 123" }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query: LookupQuery = serde_json::from_value(args)?;
        Ok(serde_json::to_value(self.store.lookup(&query))?)
    }
}

pub struct PhoneFormatTool;

#[async_trait]
impl Tool for PhoneFormatTool {
    fn name(&self) -> &str {
        ToolName::ValidatePhoneNumberFormat.as_str()
    }

    fn description(&self) -> &str {
        "Find Korean cellphone and landline numbers in text and return them in canonical dashed form."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text that may contain phone numbers"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let text = text_arg(&args)?;
        Ok(serde_json::to_value(validate_phone_format(text))?)
    }
}

/// Registry holding all three tools, sharing `store`.
pub fn default_registry(store: Arc<AddressLookupStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ToolName::ValidateKoreanAddressFormat, Arc::new(AddressFormatTool));
    registry.register(
        ToolName::LookupAddressComponents,
        Arc::new(AddressLookupTool::new(store)),
    );
    registry.register(ToolName::ValidatePhoneNumberFormat, Arc::new(PhoneFormatTool));
    registry
}

fn text_arg(args: &Value) -> anyhow::Result<&str> {
    args["text"]
        .as_str()
        .or_else(|| args["extracted_text"].as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing 'text' argument"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_contains_all_tools() {
        let registry = default_registry(AddressLookupStore::embedded());
        assert_eq!(registry.list(), ToolName::ALL.to_vec());
        for name in ToolName::ALL {
            assert_eq!(registry.get(name).unwrap().name(), name.as_str());
        }
    }

    #[tokio::test]
    async fn test_address_format_tool_output() {
        let out = AddressFormatTool
            .execute(json!({"text": "서울특별시 강남구 테헤란로 123"}))
            .await
            .unwrap();
        assert_eq!(out["road_name"]["value"], "테헤란로");
        assert_eq!(out["ho"]["found"], false);
    }

    #[tokio::test]
    async fn test_lookup_tool_output() {
        let tool = AddressLookupTool::new(AddressLookupStore::embedded());
        let out = tool
            .execute(json!({"sigungu": "강남구", "road_name": "자극로"}))
            .await
            .unwrap();
        assert_eq!(out["road_name"]["standardized"], "자곡로");
        assert_eq!(out["road_name"]["status"], "corrected");
        assert_eq!(out["inferred_sido"], "서울특별시");
    }

    #[tokio::test]
    async fn test_phone_tool_requires_text() {
        assert!(PhoneFormatTool.execute(json!({})).await.is_err());
        let out = PhoneFormatTool
            .execute(json!({"text": "010-1234-5678"}))
            .await
            .unwrap();
        assert_eq!(out["total_phones"], 1);
        assert_eq!(out["phones_found"][0]["phone_type"], "cellphone");
    }
}
