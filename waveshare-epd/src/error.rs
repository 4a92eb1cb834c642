use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpdError>;

#[derive(Error, Debug)]
pub enum EpdError {
    #[cfg(feature = "rpi")]
    #[error(transparent)]
    Gpio(#[from] rppal::gpio::Error),
    #[cfg(feature = "rpi")]
    #[error(transparent)]
    Spi(#[from] rppal::spi::Error),
    #[error("unsupported image size {0}x{1}")]
    Size(u32, u32),
}
