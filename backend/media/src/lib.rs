use std::time::{Duration, Instant};

use anyhow::Result;
use juso_core::{OcrOutput, OcrProvider};
use tracing::{info, warn};

pub mod mime_detect;
pub mod upstage;

pub use mime_detect::{detect_mime_type, is_image, validate_image, ImageInput, ImageInputError};
pub use upstage::{ocr_output_from_value, UpstageOcr};

/// OCR result with the wall time the provider took.
#[derive(Debug, Clone)]
pub struct OcrRun {
    pub output: OcrOutput,
    pub elapsed: Duration,
}

impl OcrRun {
    pub fn has_content(&self) -> bool {
        !self.output.text.trim().is_empty()
    }
}

/// Validate an image and run it through `provider`.
pub async fn ocr_image(
    provider: &dyn OcrProvider,
    file_name: &str,
    bytes: Vec<u8>,
    max_bytes: usize,
) -> Result<OcrRun> {
    let input = validate_image(file_name, bytes, max_bytes)?;
    info!(
        provider = provider.name(),
        mime = input.mime_type,
        bytes = input.bytes.len(),
        "Image validated"
    );

    let started = Instant::now();
    let output = provider.extract_text(&input.bytes, &input.file_name).await?;
    let run = OcrRun {
        output,
        elapsed: started.elapsed(),
    };
    if !run.has_content() {
        warn!(file = file_name, "No text found in image");
    }
    Ok(run)
}
