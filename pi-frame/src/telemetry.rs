//! Append-only CSV logs kept next to the generated images.

use crate::{
    hardware::{pijuice::{BatteryStatus, InputStatus}, BatteryInfo},
    Result,
};
use serde::Serialize;
use std::{fs::OpenOptions, path::Path};

pub const GENERATION_LOG: &str = "piframe.log.csv";
pub const BATTERY_LOG: &str = "battery.log.csv";

/// One row per image shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationLog {
    pub timestamp: String,
    pub description_model_id: String,
    pub title: Option<String>,
    pub description: String,
    pub image_model_id: String,
    pub image_prompt: String,
}

/// One row per cycle run on a PiJuice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryLog {
    pub timestamp: String,
    pub battery_level: f32,
    pub battery_status: BatteryStatus,
    pub power_input: InputStatus,
    pub power_input_5v: InputStatus,
    pub temperature_c: i16,
    pub voltage_mv: u16,
    pub current_ma: i16,
    pub io_voltage_mv: u16,
    pub io_current_ma: i16,
    /// JSON object.
    pub profile: String,
    /// JSON object.
    pub faults: String,
}

impl BatteryLog {
    pub fn new(timestamp: String, info: &BatteryInfo) -> Result<Self> {
        Ok(Self {
            timestamp,
            battery_level: info.charge_level,
            battery_status: info.status,
            power_input: info.power_input,
            power_input_5v: info.power_input_5v,
            temperature_c: info.temperature_c,
            voltage_mv: info.voltage_mv,
            current_ma: info.current_ma,
            io_voltage_mv: info.io_voltage_mv,
            io_current_ma: info.io_current_ma,
            profile: serde_json::to_string(&info.profile)?,
            faults: serde_json::to_string(&info.faults)?,
        })
    }
}

/// Append `record` to `directory/name`, writing the header only when the file is new.
pub fn write_log(directory: &Path, name: &str, record: &impl Serialize) -> Result<()> {
    let path = directory.join(name);
    let exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}
