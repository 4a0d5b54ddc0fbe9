//! `juso extract`: OCR text or an image in, numbered contact entries out.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use juso_agent::MultiEntryPipeline;
use juso_core::OcrProvider;
use juso_media::ocr_image;

use crate::runtime::Runtime;

pub enum ExtractInput<'a> {
    Text(&'a Path),
    Image(&'a Path),
}

pub async fn run(runtime: &Runtime, input: ExtractInput<'_>) -> Result<Value> {
    let pipeline = MultiEntryPipeline::new(
        runtime.provider()?,
        runtime.store.clone(),
        runtime.pipeline_settings(),
    );

    match input {
        ExtractInput::Text(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            let result = pipeline.run(&text).await;
            Ok(serde_json::to_value(result)?)
        }
        ExtractInput::Image(path) => {
            let ocr = runtime.ocr()?;
            extract_image(&pipeline, &ocr, path, runtime.max_image_bytes()).await
        }
    }
}

async fn extract_image(
    pipeline: &MultiEntryPipeline,
    ocr: &dyn OcrProvider,
    path: &Path,
    max_image_bytes: usize,
) -> Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.jpg");

    let run = ocr_image(ocr, file_name, bytes, max_image_bytes).await?;
    let ocr_ms = u64::try_from(run.elapsed.as_millis()).unwrap_or(u64::MAX);
    info!(ocr_ms, has_content = run.has_content(), "OCR finished");

    let result = pipeline.run_timed(&run.output.text, Some(ocr_ms)).await;
    let mut value = serde_json::to_value(result)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "ocr".to_string(),
            json!({
                "provider": ocr.name(),
                "text_length": run.output.text.chars().count(),
                "total_words": run.output.total_words,
                "average_word_confidence": run.output.average_word_confidence,
            }),
        );
    }
    Ok(value)
}
