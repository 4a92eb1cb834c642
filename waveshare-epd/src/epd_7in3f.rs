//! 7.3" 7-color (ACeP)

use crate::Result;
use image::Pixel;
use log::{debug, warn};
use rppal::{
    gpio::{Gpio, InputPin, OutputPin},
    spi::{Bus, Mode, SlaveSelect, Spi},
};
use std::thread;
use std::time::Duration;

const RST_PIN: u8 = 17;
const DC_PIN: u8 = 25;
const CS_PIN: u8 = 8;
const BUSY_PIN: u8 = 24;
const PWR_PIN: u8 = 18;

pub const EPD_WIDTH: usize = 800;
pub const EPD_HEIGHT: usize = 480;
/// Two 4-bit pixels per byte.
pub const EPD_BUFFER_SIZE: usize = EPD_WIDTH * EPD_HEIGHT / 2;

/// Index of white, used to clear the panel.
pub const WHITE: u8 = 0x1;

/// Largest transfer accepted by the spidev driver with default settings.
const SPI_CHUNK: usize = 4096;

pub struct Epd {
    reset_pin: OutputPin,
    dc_pin: OutputPin,
    cs_pin: OutputPin,
    pwr_pin: OutputPin,
    busy_pin: InputPin,
    spi: Spi,
}
impl Epd {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new()?;
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 4_000_000, Mode::Mode0)?;
        let mut pwr_pin = gpio.get(PWR_PIN)?.into_output();
        pwr_pin.set_high();
        Ok(Self {
            reset_pin: gpio.get(RST_PIN)?.into_output(),
            dc_pin: gpio.get(DC_PIN)?.into_output(),
            cs_pin: gpio.get(CS_PIN)?.into_output(),
            pwr_pin,
            busy_pin: gpio.get(BUSY_PIN)?.into_input(),
            spi,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.reset();
        self.read_busy();
        thread::sleep(Duration::from_millis(30));

        // CMDH
        self.send_command(0xAA)?;
        self.send_data(&[0x49, 0x55, 0x20, 0x08, 0x09, 0x18])?;

        self.send_command(0x01)?;
        self.send_data(&[0x3F, 0x00, 0x32, 0x2A, 0x0E, 0x2A])?;

        self.send_command(0x00)?;
        self.send_data(&[0x5F, 0x69])?;

        self.send_command(0x03)?;
        self.send_data(&[0x00, 0x54, 0x00, 0x44])?;

        self.send_command(0x05)?;
        self.send_data(&[0x40, 0x1F, 0x1F, 0x2C])?;

        self.send_command(0x06)?;
        self.send_data(&[0x6F, 0x1F, 0x1F, 0x22])?;

        self.send_command(0x08)?;
        self.send_data(&[0x6F, 0x1F, 0x1F, 0x22])?;

        // IPC
        self.send_command(0x13)?;
        self.send_data(&[0x00, 0x04])?;

        self.send_command(0x30)?;
        self.send_data(&[0x3C])?;

        // TSE
        self.send_command(0x41)?;
        self.send_data(&[0x00])?;

        self.send_command(0x50)?;
        self.send_data(&[0x3F])?;

        self.send_command(0x60)?;
        self.send_data(&[0x02, 0x00])?;

        // Resolution: 800x480
        self.send_command(0x61)?;
        self.send_data(&[0x03, 0x20, 0x01, 0xE0])?;

        self.send_command(0x82)?;
        self.send_data(&[0x1E])?;

        self.send_command(0x84)?;
        self.send_data(&[0x00])?;

        // AGID
        self.send_command(0x86)?;
        self.send_data(&[0x00])?;

        self.send_command(0xE3)?;
        self.send_data(&[0x2F])?;

        // CCSET
        self.send_command(0xE0)?;
        self.send_data(&[0x00])?;

        // TSSET
        self.send_command(0xE6)?;
        self.send_data(&[0x00])?;
        Ok(())
    }

    /// Display a buffer produced by [`pack_buffer`].
    pub fn display(&mut self, buffer: &[u8]) -> Result<()> {
        self.send_command(0x10)?;
        for chunk in buffer[..buffer.len().min(EPD_BUFFER_SIZE)].chunks(SPI_CHUNK) {
            self.send_data(chunk)?;
        }
        self.turn_on()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.display(&vec![(WHITE << 4) | WHITE; EPD_BUFFER_SIZE])
    }

    pub fn sleep(&mut self) -> Result<()> {
        self.send_command(0x07)?;
        self.send_data(&[0xA5])?;
        Ok(())
    }

    fn turn_on(&mut self) -> Result<()> {
        self.send_command(0x04)?; // Power ON
        self.read_busy();
        self.send_command(0x12)?; // Display Refresh
        self.send_data(&[0x00])?;
        self.read_busy();
        self.send_command(0x02)?; // Power OFF
        self.send_data(&[0x00])?;
        self.read_busy();
        Ok(())
    }

    fn reset(&mut self) {
        self.reset_pin.set_high();
        thread::sleep(Duration::from_millis(20));
        self.reset_pin.set_low();
        thread::sleep(Duration::from_millis(2));
        self.reset_pin.set_high();
        thread::sleep(Duration::from_millis(20));
    }

    fn send_command(&mut self, command: u8) -> Result<()> {
        self.dc_pin.set_low();
        self.cs_pin.set_low();
        self.spi.write(&[command])?;
        self.cs_pin.set_high();
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.dc_pin.set_high();
        self.cs_pin.set_low();
        self.spi.write(data)?;
        self.cs_pin.set_high();
        Ok(())
    }

    fn read_busy(&self) {
        debug!("e-Paper busy");
        while self.busy_pin.is_low() {
            thread::sleep(Duration::from_millis(5));
        }
        debug!("e-Paper busy release")
    }
}

impl Drop for Epd {
    fn drop(&mut self) {
        debug!("close 5V, Module enters 0 power consumption ...");
        self.reset_pin.set_low();
        self.dc_pin.set_low();
        self.pwr_pin.set_low();
    }
}

/// Palette indices, one per pixel.
type IndexImage = image::GrayImage;

/// Pack an image of palette indices into the panel's 4bpp layout.
///
/// Landscape images are packed as is, portrait ones are rotated 90° counter-clockwise.
pub fn pack_buffer(image: &IndexImage) -> Option<Vec<u8>> {
    let mut buf = vec![(WHITE << 4) | WHITE; EPD_BUFFER_SIZE];
    if image.width() as usize == EPD_WIDTH && image.height() as usize == EPD_HEIGHT {
        debug!("Horizontal");
        for (x, y, pixel) in image.enumerate_pixels() {
            set_pixel(&mut buf, x as usize, y as usize, pixel.channels()[0]);
        }
        Some(buf)
    } else if image.width() as usize == EPD_HEIGHT && image.height() as usize == EPD_WIDTH {
        debug!("Vertical");
        for (x, y, pixel) in image.enumerate_pixels() {
            set_pixel(
                &mut buf,
                y as usize,
                EPD_HEIGHT - x as usize - 1,
                pixel.channels()[0],
            );
        }
        Some(buf)
    } else {
        warn!("Unsupported image size {:?}", image.dimensions());
        None
    }
}
fn set_pixel(buf: &mut [u8], x: usize, y: usize, index: u8) {
    let i = (x + y * EPD_WIDTH) / 2;
    if x % 2 == 0 {
        buf[i] = (buf[i] & 0x0F) | ((index & 0x0F) << 4);
    } else {
        buf[i] = (buf[i] & 0xF0) | (index & 0x0F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pixel_nibbles() {
        let mut buf = [0x11u8; 2];
        set_pixel(&mut buf, 0, 0, 4);
        assert_eq!(buf, [0x41, 0x11]);
        set_pixel(&mut buf, 1, 0, 2);
        assert_eq!(buf, [0x42, 0x11]);
        set_pixel(&mut buf, 3, 0, 0);
        assert_eq!(buf, [0x42, 0x10]);
    }
}
