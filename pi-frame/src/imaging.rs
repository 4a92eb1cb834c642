//! Fitting generated images to the panel and captioning them.

use crate::{FrameError, Result};
use ab_glyph::{Font, FontVec, PxScale};
use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::{fs, path::Path};

pub const DISPLAY_WIDTH: u32 = 800;
pub const DISPLAY_HEIGHT: u32 = 480;

const FONT_SIZE: f32 = 28.0;
const MIN_FONT_SIZE: f32 = 14.0;
const FONT_STEP: f32 = 2.0;
const PADDING: u32 = 10;
const BAND_OPACITY: f32 = 0.6;
const OUTLINE: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Size of `width`x`height` scaled so that it covers `target_width`x`target_height`
/// with one side matching exactly.
pub fn scaled_dimensions(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(FrameError::Decode("empty image".into()));
    }
    let (w, h) = (width as u64, height as u64);
    let (tw, th) = (target_width as u64, target_height as u64);
    let (new_width, new_height) = if w * th > tw * h {
        (w * th / h, th)
    } else {
        (tw, h * tw / w)
    };
    let too_large = |_| FrameError::Decode(format!("cannot scale a {}x{} image", width, height));
    Ok((
        u32::try_from(new_width).map_err(too_large)?,
        u32::try_from(new_height).map_err(too_large)?,
    ))
}

/// Resize without distortion, then crop the middle to exactly `width`x`height`.
pub fn scale_and_crop(image: &DynamicImage, width: u32, height: u32) -> Result<RgbImage> {
    let (new_width, new_height) = scaled_dimensions(image.width(), image.height(), width, height)?;
    let resized = imageops::resize(&image.to_rgb8(), new_width, new_height, FilterType::Lanczos3);
    Ok(imageops::crop_imm(
        &resized,
        (new_width - width) / 2,
        (new_height - height) / 2,
        width,
        height,
    )
    .to_image())
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|e| FrameError::Config(format!("font {}: {}", path.display(), e)))
}

/// Largest size, stepping down from `initial`, whose measured width fits.
/// Never goes below `minimum`.
pub fn fit_font_size(max_width: u32, initial: f32, minimum: f32, measure: impl Fn(f32) -> u32) -> f32 {
    let mut size = initial;
    while size > minimum && measure(size) > max_width {
        size = (size - FONT_STEP).max(minimum);
    }
    size
}

/// Darken every row from `top` down.
pub fn shade_band(image: &mut RgbImage, top: u32, opacity: f32) {
    let keep = 1.0 - opacity.clamp(0.0, 1.0);
    for y in top..image.height() {
        for x in 0..image.width() {
            let Rgb(channels) = image.get_pixel_mut(x, y);
            for c in channels.iter_mut() {
                *c = (*c as f32 * keep).round() as u8;
            }
        }
    }
}

/// Caption `image` with `text` on a dark band along the bottom edge.
pub fn overlay_prompt(image: &RgbImage, text: &str, font: &impl Font) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();
    let size = fit_font_size(
        width.saturating_sub(2 * PADDING),
        FONT_SIZE,
        MIN_FONT_SIZE,
        |size| text_size(PxScale::from(size), font, text).0,
    );
    let scale = PxScale::from(size);
    let band = (size.ceil() as u32 + 2 * PADDING).min(height);
    shade_band(&mut canvas, height - band, BAND_OPACITY);

    let (text_width, _) = text_size(scale, font, text);
    let x = (width as i32 - text_width as i32) / 2;
    let y = (height - band + PADDING) as i32;
    for (dx, dy) in OUTLINE {
        draw_text_mut(&mut canvas, Rgb([0, 0, 0]), x + dx, y + dy, scale, font, text);
    }
    draw_text_mut(&mut canvas, Rgb([255, 255, 255]), x, y, scale, font, text);
    canvas
}
