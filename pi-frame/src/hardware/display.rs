use crate::{FrameError, Result};
use image::RgbImage;
use log::{info, warn};
use waveshare_epd::epd_7in3f::{pack_buffer, Epd};

/// The e-Paper panel, when one is connected.
pub enum Display {
    Panel(Epd),
    Unavailable,
}

impl Display {
    pub fn probe() -> Self {
        match Epd::new() {
            Ok(epd) => {
                info!("e-Paper panel found");
                Self::Panel(epd)
            }
            Err(e) => {
                info!("No e-Paper panel: {}", e);
                Self::Unavailable
            }
        }
    }

    /// Quantize `image` to the panel's palette and show it.
    pub fn render(&mut self, image: &RgbImage) -> Result<()> {
        let epd = match self {
            Self::Panel(epd) => epd,
            Self::Unavailable => {
                warn!("No display, skipping render");
                return Ok(());
            }
        };
        let indices = rgb2acep::to_indices(image.clone(), true);
        let buffer = pack_buffer(&indices)
            .ok_or_else(|| waveshare_epd::Error::Size(image.width(), image.height()))?;
        info!("Rendering image");
        epd.init()?;
        epd.clear()?;
        epd.display(&buffer)?;
        epd.sleep().map_err(FrameError::from)
    }
}
