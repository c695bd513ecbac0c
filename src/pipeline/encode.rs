//! Image encoding: raw image bytes → base64 PNG wrapped in `ImageData`.
//!
//! Vision APIs accept images as base64 data embedded in the JSON request.
//! Slide pictures are often photos at full camera resolution, so they are
//! scaled down to a bounded longest edge first and flattened to RGB; an
//! accessibility description does not need more detail than that.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Scale `img` so its longest edge is at most `max_dim`, keeping the aspect
/// ratio, and convert it to 8-bit RGB. Smaller images are not enlarged.
pub fn prepare_image(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let img = if img.width().max(img.height()) > max_dim {
        img.resize(max_dim, max_dim, FilterType::Lanczos3)
    } else {
        img
    };
    DynamicImage::ImageRgb8(img.to_rgb8())
}

/// Decode `bytes` (any format the `image` crate reads), prepare it and
/// encode it as a base64 PNG ready for the vision API.
pub fn encode_image(bytes: &[u8], max_dim: u32) -> Result<ImageData, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (w, h) = (img.width(), img.height());
    let img = prepare_image(img, max_dim);

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image as {}x{} → {} bytes base64",
        w,
        h,
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png"))
}
