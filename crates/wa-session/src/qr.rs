//! Pairing-code rendering for direct display in a browser.

use std::io::Cursor;

use base64::Engine;
use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

/// Pixels per QR module.
const MODULE_SIZE: u32 = 8;
/// Light border, in modules.
const QUIET_ZONE: u32 = 4;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR payload is empty")]
    Empty,

    #[error("QR generation failed: {0}")]
    Encode(String),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Render a raw pairing payload as a `data:image/png;base64,...` URL.
pub fn qr_data_url(payload: &str) -> Result<String, QrError> {
    let png = qr_png(payload)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(format!("data:image/png;base64,{encoded}"))
}

/// Render a raw pairing payload as PNG bytes.
pub fn qr_png(payload: &str) -> Result<Vec<u8>, QrError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(QrError::Empty);
    }

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| QrError::Encode(e.to_string()))?;

    let modules = code.width() as u32;
    let size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(size, size, |x, y| {
        let (mx, my) = (x / MODULE_SIZE, y / MODULE_SIZE);
        if mx < QUIET_ZONE || my < QUIET_ZONE {
            return Luma([255u8]);
        }
        let (mx, my) = (mx - QUIET_ZONE, my - QUIET_ZONE);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
