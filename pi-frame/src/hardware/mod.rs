//! Raspberry Pi peripherals. Each one is probed once and degrades to a no-op
//! when it is missing, so the frame also runs on a development machine.

pub mod display;
pub mod pijuice;
pub mod power;

pub use display::Display;
pub use power::{BatteryInfo, Power};
