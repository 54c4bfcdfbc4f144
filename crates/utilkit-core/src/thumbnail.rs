//! Thumbnail generation

use crate::error::{Result, UtilkitError};
use crate::utils::validation;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::instrument;

/// Resize to `dest_width`, keeping the aspect ratio
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn thumb_image(img: &DynamicImage, dest_width: u32) -> Result<DynamicImage> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(UtilkitError::InvalidInput {
            message: "cannot thumbnail an empty image".to_string(),
        });
    }

    let dest_height = (f64::from(height) * (f64::from(dest_width) / f64::from(width))) as u32;
    thumb_crop_image(img, dest_width, dest_height.max(1))
}

/// Scale to cover `width` x `height` and crop the overflow around the center
#[instrument(skip(img), fields(src_width = img.width(), src_height = img.height()))]
pub fn thumb_crop_image(img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    validation::validate_dimensions(width, height)?;
    Ok(img.resize_to_fill(width, height, FilterType::Lanczos3))
}
