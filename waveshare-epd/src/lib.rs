#[cfg(feature = "epd_7in3f")]
pub mod epd_7in3f;
mod error;

pub use error::{EpdError as Error, Result};
