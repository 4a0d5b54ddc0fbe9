//! MIME type detection and image input checks.
//!
//! OCR only accepts images; everything else is rejected before any upload.

use std::path::Path;

use thiserror::Error;

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "heic"         => "image/heic",

        "pdf"          => "application/pdf",
        "txt"          => "text/plain",
        "json"         => "application/json",

        _              => "application/octet-stream",
    }
}

/// Whether a MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageInputError {
    #[error("File must be an image (got {mime})")]
    NotAnImage { mime: &'static str },

    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Image file is empty")]
    Empty,
}

/// Image bytes that passed type and size checks.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Check an image by extension and size before it is sent to OCR.
pub fn validate_image(
    file_name: &str,
    bytes: Vec<u8>,
    max_bytes: usize,
) -> Result<ImageInput, ImageInputError> {
    let mime_type = detect_mime_type(Path::new(file_name));
    if !is_image(mime_type) {
        return Err(ImageInputError::NotAnImage { mime: mime_type });
    }
    if bytes.is_empty() {
        return Err(ImageInputError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageInputError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    Ok(ImageInput {
        file_name: file_name.to_string(),
        mime_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_mime_type(&PathBuf::from("scan.JPG")), "image/jpeg");
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_mime_type(&PathBuf::from("file.xyz")), "application/octet-stream");
    }

    #[test]
    fn accepts_small_png() {
        let input = validate_image("명함.png", vec![0u8; 32], 1024).unwrap();
        assert_eq!(input.mime_type, "image/png");
        assert_eq!(input.bytes.len(), 32);
    }

    #[test]
    fn rejects_non_image() {
        let err = validate_image("contacts.pdf", vec![1], 1024).unwrap_err();
        assert_eq!(err, ImageInputError::NotAnImage { mime: "application/pdf" });
    }

    #[test]
    fn rejects_oversized_and_empty() {
        assert_eq!(
            validate_image("a.jpg", vec![0u8; 11], 10).unwrap_err(),
            ImageInputError::TooLarge { size: 11, limit: 10 }
        );
        assert_eq!(validate_image("a.jpg", Vec::new(), 10).unwrap_err(), ImageInputError::Empty);
    }
}
