//! Image helpers: PNG encoding, MIME sniffing and `ImageData` wrapping.
//!
//! Vision APIs accept images as base64 data embedded in the JSON request
//! body. Raster output from pdfium is encoded as PNG because it is lossless;
//! Word media parts are passed through in their original encoding.

use crate::document::ImageRef;
use crate::error::CollaboratorError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Formats every supported vision backend accepts.
const VISION_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Guess the MIME type of an encoded image from its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

/// Encode a raster image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a raster image as a PNG [`ImageRef`].
pub fn png_image_ref(id: impl Into<String>, img: &DynamicImage) -> Result<ImageRef, image::ImageError> {
    let data = encode_png(img)?;
    Ok(ImageRef {
        id: id.into(),
        mime_type: Some("image/png".to_string()),
        data,
    })
}

/// Wrap an [`ImageRef`] as base64 `ImageData` for a vision request.
///
/// Formats outside [`VISION_MIME_TYPES`] (EMF, WMF, TIFF, …) are rejected
/// with [`CollaboratorError::UnsupportedImage`] so enrichment can skip them.
/// `detail: "high"` keeps fine print legible for OCR.
pub fn to_image_data(image: &ImageRef) -> Result<ImageData, CollaboratorError> {
    let mime = image
        .mime_type
        .as_deref()
        .filter(|m| VISION_MIME_TYPES.contains(m))
        .ok_or_else(|| CollaboratorError::UnsupportedImage {
            image_id: image.id.clone(),
        })?;

    let b64 = STANDARD.encode(&image.data);
    debug!("Encoded image '{}' → {} bytes base64", image.id, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}
