use crate::error::{HoHatchError, Result};
use crate::scratch::RetryPolicy;
use base64::{engine::general_purpose, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::path::Path;

/// Edge length every injected texture is normalised to
pub const INJECT_TEXTURE_SIZE: u32 = 1024;

/// Image types accepted as replacements
pub const REPLACEMENT_EXTENSIONS: [&str; 4] = ["jfif", "jpeg", "jpg", "png"];

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// `data:image/jpeg;base64,...` for raw JPEG bytes
pub fn jpeg_data_uri(bytes: &[u8]) -> String {
    format!("{}{}", JPEG_DATA_URI_PREFIX, general_purpose::STANDARD.encode(bytes))
}

/// Read a JPEG file and encode it as a data URI
pub fn jpeg_file_to_data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(jpeg_data_uri(&bytes))
}

fn save_jpeg(img: DynamicImage, path: &Path) -> Result<()> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.save_with_format(path, ImageFormat::Jpeg)?;
    Ok(())
}

/// Flip an image file top-to-bottom and overwrite it as JPEG.
///
/// texconv and the webview disagree on the vertical origin, so every JPEG
/// produced from a DDS goes through here. The file was just written by a
/// subprocess and may still be locked, hence the retries.
pub fn flip_vertical_in_place(path: &Path, policy: &RetryPolicy) -> Result<()> {
    policy
        .run(&format!("Flipping {}", path.display()), || -> Result<()> {
            let img = image::open(path)?;
            save_jpeg(img.flipv(), path)
        })
        .map_err(|e| {
            HoHatchError::FileSystem(format!(
                "JPG Conversion Failed: Flipping/Verification failed after multiple retries: {}",
                e
            ))
        })
}

/// Prepare a replacement for DDS conversion: RGB, flipped, resized to 1024x1024, saved as JPEG.
/// Returns the dimensions written.
pub fn prepare_replacement(src: &Path, dest: &Path) -> Result<(u32, u32)> {
    let img = image::open(src)?;
    let flipped = DynamicImage::ImageRgb8(img.to_rgb8()).flipv();
    let resized = flipped.resize_exact(
        INJECT_TEXTURE_SIZE,
        INJECT_TEXTURE_SIZE,
        FilterType::Lanczos3,
    );
    let dims = (resized.width(), resized.height());
    save_jpeg(resized, dest)?;
    log::debug!(
        "Prepared replacement {} -> {} ({}x{})",
        src.display(),
        dest.display(),
        dims.0,
        dims.1
    );
    Ok(dims)
}

pub fn is_replacement_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            REPLACEMENT_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
