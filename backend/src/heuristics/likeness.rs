//! Color/texture heuristic for "does this look like a feces sample".
//!
//! Independent of the classifier. Three cues are combined:
//! - fraction of brown-ish pixels over the whole frame
//! - the same fraction over the central window, where samples are usually framed
//! - mean absolute luminance gradient as a roughness measure
//!
//! Every cue is a mean over pixels or pixel pairs and is defined as 0 when
//! there is nothing to average, so the score is always finite.

use image::{Rgb, RgbImage};
use std::ops::Range;

use crate::config::HeuristicConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikenessScore {
    pub brown_ratio: f32,
    pub center_brown_ratio: f32,
    pub texture: f32,
    pub score: f32,
}

pub fn likeness_score(img: &RgbImage, config: &HeuristicConfig) -> LikenessScore {
    let (w, h) = img.dimensions();

    let brown_ratio = brown_fraction(img, 0..w, 0..h, config);

    let cx0 = (w as f32 * config.center_start) as u32;
    let cx1 = (w as f32 * config.center_end) as u32;
    let cy0 = (h as f32 * config.center_start) as u32;
    let cy1 = (h as f32 * config.center_end) as u32;
    let center_brown_ratio = brown_fraction(img, cx0..cx1.min(w), cy0..cy1.min(h), config);

    let texture = texture_magnitude(img, config);

    let score = config.brown_weight * brown_ratio
        + config.center_weight * center_brown_ratio
        + config.texture_weight * texture;

    LikenessScore {
        brown_ratio,
        center_brown_ratio,
        texture,
        score,
    }
}

/// Hue in degrees, saturation and value in [0, 1].
fn to_hsv(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(|c| c as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

fn is_brown(pixel: &Rgb<u8>, config: &HeuristicConfig) -> bool {
    let (h, s, v) = to_hsv(pixel);
    (config.hue_min_deg..=config.hue_max_deg).contains(&h)
        && s >= config.saturation_min
        && (config.value_min..=config.value_max).contains(&v)
}

fn brown_fraction(
    img: &RgbImage,
    xs: Range<u32>,
    ys: Range<u32>,
    config: &HeuristicConfig,
) -> f32 {
    let total = xs.len() * ys.len();
    if total == 0 {
        return 0.0;
    }

    let brown = ys
        .flat_map(|y| xs.clone().map(move |x| (x, y)))
        .filter(|&(x, y)| is_brown(img.get_pixel(x, y), config))
        .count();

    brown as f32 / total as f32
}

/// Mean of the horizontal and vertical absolute luminance differences, scaled to [0, 1].
fn texture_magnitude(img: &RgbImage, config: &HeuristicConfig) -> f32 {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let [wr, wg, wb] = config.luma_weights;
    let luma: Vec<f32> = img
        .pixels()
        .map(|p| wr * p[0] as f32 + wg * p[1] as f32 + wb * p[2] as f32)
        .collect();

    let horizontal = (0..h).flat_map(|y| (1..w).map(move |x| (y * w + x, y * w + x - 1)));
    let vertical = (1..h).flat_map(|y| (0..w).map(move |x| (y * w + x, (y - 1) * w + x)));
    let gx = mean_abs_diff(&luma, horizontal);
    let gy = mean_abs_diff(&luma, vertical);

    ((gx + gy) / 2.0 / 255.0) as f32
}

fn mean_abs_diff(luma: &[f32], pairs: impl Iterator<Item = (usize, usize)>) -> f64 {
    let (sum, n) = pairs.fold((0.0f64, 0usize), |(sum, n), (a, b)| {
        (sum + (luma[a] - luma[b]).abs() as f64, n + 1)
    });
    if n == 0 { 0.0 } else { sum / n as f64 }
}
