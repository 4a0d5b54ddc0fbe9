//! `juso correct`: one address string, standardized against the lookup store.

use anyhow::Result;
use serde_json::Value;

use juso_agent::AddressCorrector;

use crate::runtime::Runtime;

pub async fn run(runtime: &Runtime, address: &str) -> Result<Value> {
    let corrector = AddressCorrector::new(
        runtime.provider()?,
        &runtime.llm_settings(),
        runtime.store.clone(),
        runtime.review_policy(),
    );
    let correction = corrector.correct(address).await;
    Ok(serde_json::to_value(correction)?)
}
