//! `juso validate`: run the offline phone and address detectors over text.

use anyhow::Result;
use serde_json::{json, Value};

use juso_tools::{components_from_text, validate_address_format, validate_phone_format};

pub fn run(text: &str) -> Result<Value> {
    let address = components_from_text(text);
    Ok(json!({
        "phone": validate_phone_format(text),
        "address": validate_address_format(text),
        "formatted_address": address.to_formatted_address(),
    }))
}
