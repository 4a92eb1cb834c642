use image::{imageops::ColorMap, Rgb};

/// Colors of the 7-color ACeP e-Paper, in the order the controller indexes them.
pub const PALETTE: [[u8; 3]; 7] = [
    [0, 0, 0],       // Black
    [255, 255, 255], // White
    [0, 255, 0],     // Green
    [0, 0, 255],     // Blue
    [255, 0, 0],     // Red
    [255, 255, 0],   // Yellow
    [255, 128, 0],   // Orange
];

/// Convert an image to the ACeP palette.
///
/// The result is still RGB, but only uses the seven palette colors.
pub fn to_acep(mut image: image::RgbImage, dither: bool) -> image::RgbImage {
    if dither {
        image::imageops::dither(&mut image, &Acep)
    } else {
        for pixel in image.pixels_mut() {
            Acep.map_color(pixel);
        }
    }
    image
}

/// Convert an image to the ACeP palette.
///
/// The result is a gray image whose values are indices into [`PALETTE`], which
/// is what the panel driver expects.
pub fn to_indices(image: image::RgbImage, dither: bool) -> image::GrayImage {
    let image = to_acep(image, dither);
    let (width, height) = image.dimensions();
    image::GrayImage::from_fn(width, height, |x, y| {
        image::Luma([Acep.index_of(image.get_pixel(x, y)) as u8])
    })
}

/// Perceptual distance between two colors ("redmean" approximation).
///
/// Cheaper than a Lab conversion, and good enough to pick the closest of seven
/// very different colors.
fn distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    let red_mean = (a[0] as f32 + b[0] as f32) / 2.0;
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    ((2.0 + red_mean / 256.0) * dr * dr
        + 4.0 * dg * dg
        + (2.0 + (255.0 - red_mean) / 256.0) * db * db)
        .sqrt()
}

/// Map RGB pixels to the closest ACeP color.
#[derive(Debug, Clone, Copy)]
struct Acep;

impl ColorMap for Acep {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Self::Color) -> usize {
        PALETTE
            .iter()
            .enumerate()
            .map(|(i, p)| (i, distance(color.0, *p)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or(1, |(i, _)| i)
    }
    fn lookup(&self, index: usize) -> Option<Self::Color> {
        PALETTE.get(index).copied().map(Rgb)
    }
    fn has_lookup(&self) -> bool {
        true
    }
    fn map_color(&self, color: &mut Self::Color) {
        let index = self.index_of(color);
        *color = Rgb(PALETTE[index]);
    }
}
