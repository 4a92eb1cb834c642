pub mod config;
mod error;
pub mod frame;
pub mod hardware;
pub mod history;
pub mod imaging;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod schedule;
pub mod telemetry;
pub mod topic;
pub mod weather;

pub use crate::error::{FrameError, FrameError as Error, Result};
