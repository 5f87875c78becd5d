use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::config::PreprocessConfig;
use crate::error::ValidationError;

pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Bounding box `(x0, y0, x1, y1)`, end-exclusive, of every pixel that differs
/// from the top-left one. `None` for empty or single-colour images.
pub fn content_bbox(img: &RgbImage) -> Option<(u32, u32, u32, u32)> {
    let background = *img.get_pixel_checked(0, 0)?;
    img.enumerate_pixels()
        .filter(|(_, _, p)| **p != background)
        .fold(None, |bbox, (x, y, _)| match bbox {
            None => Some((x, y, x + 1, y + 1)),
            Some((x0, y0, x1, y1)) => {
                Some((x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)))
            }
        })
}

pub fn validate(img: &RgbImage, config: &PreprocessConfig) -> Result<(), ValidationError> {
    let (width, height) = img.dimensions();
    if width.min(height) < config.min_side {
        return Err(ValidationError::TooSmall {
            width,
            height,
            min_side: config.min_side,
        });
    }
    if content_bbox(img).is_none() {
        return Err(ValidationError::Blank);
    }
    Ok(())
}

/// Shorter side to `resize_shorter`, keeping aspect ratio.
fn resized_dims(width: u32, height: u32, shorter: u32) -> (u32, u32) {
    let scale = |long: u32, short: u32| (shorter as u64 * long as u64 / short.max(1) as u64) as u32;
    if width <= height {
        (shorter, scale(height, width))
    } else {
        (scale(width, height), shorter)
    }
}

/// Resize, center-crop and normalize into a `[1, 3, crop, crop]` NCHW tensor.
pub fn to_tensor(img: &RgbImage, config: &PreprocessConfig) -> Array4<f32> {
    let crop = config.crop_size;
    let shorter = config.resize_shorter.max(crop);
    let (rw, rh) = resized_dims(img.width(), img.height(), shorter);
    let resized = imageops::resize(img, rw, rh, FilterType::Triangle);

    let left = ((rw - crop) as f32 / 2.0).round_ties_even() as u32;
    let top = ((rh - crop) as f32 / 2.0).round_ties_even() as u32;
    let cropped = imageops::crop_imm(&resized, left, top, crop, crop).to_image();

    let (mean, std) = (config.mean, config.std);
    Array4::from_shape_fn((1, 3, crop as usize, crop as usize), |(_, c, y, x)| {
        let value = cropped.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - mean[c]) / std[c]
    })
}

/// Zero-valued input of the shape the classifier expects.
pub fn zero_tensor(config: &PreprocessConfig) -> Array4<f32> {
    let crop = config.crop_size as usize;
    Array4::zeros((1, 3, crop, crop))
}
