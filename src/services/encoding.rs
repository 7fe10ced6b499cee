use std::io::Cursor;

use base64::{engine::general_purpose, Engine};
use image::{DynamicImage, ImageFormat};

use crate::error::DetectionError;
use crate::models::ImageInput;

/// Re-encode an uploaded photo as JPEG and wrap it in a base64 data URL.
/// JPEG input is passed through as-is.
pub fn to_jpeg_data_url(image: &ImageInput) -> Result<String, DetectionError> {
    if image.is_empty() {
        return Err(DetectionError::InvalidImage("empty upload".to_string()));
    }

    let jpeg = match image::guess_format(&image.bytes) {
        Ok(ImageFormat::Jpeg) => image.bytes.clone(),
        _ => reencode_as_jpeg(&image.bytes)?,
    };

    let base64_image = general_purpose::STANDARD.encode(&jpeg);
    log::debug!("📊 Image size: {} bytes, base64: {} bytes", image.len(), base64_image.len());

    Ok(format!("data:image/jpeg;base64,{}", base64_image))
}

fn reencode_as_jpeg(bytes: &[u8]) -> Result<Vec<u8>, DetectionError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| DetectionError::InvalidImage(e.to_string()))?;

    log::debug!("🔄 Re-encoded image to JPEG: {} -> {} bytes", bytes.len(), out.get_ref().len());
    Ok(out.into_inner())
}
