//! Converting binary data to a `data:` URL, and classifying files by
//! extension for the OCR API.

use base64::{Engine as _, prelude::BASE64_STANDARD};

/// Convert binary data to a `data:` URL.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    let base64_data = BASE64_STANDARD.encode(data);
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Is this a raster image extension? Images are submitted to the OCR API
/// with an `image_url` payload; everything else uses `document_url`.
pub fn is_raster_image(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png" | "avif")
}

/// MIME type for a document extension. The API needs explicit types for
/// the formats it understands; anything else is sent as a generic binary.
pub fn document_mime_type(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "pptx" => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// MIME type for a raster image extension.
pub fn image_mime_type(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "avif" => "image/avif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_encodes_base64() {
        assert_eq!(
            data_url("application/pdf", b"hello"),
            "data:application/pdf;base64,aGVsbG8="
        );
    }

    #[test]
    fn classifies_extensions() {
        assert!(is_raster_image("jpeg"));
        assert!(!is_raster_image("pdf"));
        assert_eq!(document_mime_type("pdf"), "application/pdf");
        assert_eq!(
            document_mime_type("docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(document_mime_type("xyz"), "application/octet-stream");
        assert_eq!(image_mime_type("png"), "image/png");
    }
}
