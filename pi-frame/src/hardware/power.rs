use super::pijuice::{self, BatteryProfile, BatteryStatus, Faults, InputStatus, PiJuice, PowerStatus};
use chrono::{NaiveDateTime, Timelike};
use log::{info, warn};
use std::process::Command;

/// Current available to the display through the system switch.
const DISPLAY_CURRENT_MA: u32 = 500;
/// Seconds between the power off request and the power actually being cut.
const POWER_OFF_DELAY: u8 = 30;

/// Everything the PiJuice reports about the battery at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryInfo {
    /// Between 0.0 and 1.0.
    pub charge_level: f32,
    pub status: BatteryStatus,
    pub power_input: InputStatus,
    pub power_input_5v: InputStatus,
    pub temperature_c: i16,
    pub voltage_mv: u16,
    pub current_ma: i16,
    pub io_voltage_mv: u16,
    pub io_current_ma: i16,
    pub faults: Faults,
    pub profile: BatteryProfile,
}

/// Power management, when the frame runs on a PiJuice.
///
/// Every operation is a no-op (or reports a mains powered, fully charged
/// frame) when no PiJuice was found at start up.
pub enum Power {
    PiJuice(PiJuice),
    Unavailable,
}

fn or_warn<T>(what: &str, result: pijuice::Result<T>) -> Option<T> {
    result.map_err(|e| warn!("Cannot {}: {}", what, e)).ok()
}

impl Power {
    pub fn probe() -> Self {
        match PiJuice::new() {
            Ok(pijuice) => {
                info!("PiJuice found");
                Self::PiJuice(pijuice)
            }
            Err(e) => {
                info!("No PiJuice: {}", e);
                Self::Unavailable
            }
        }
    }

    pub fn power_status(&self) -> Option<PowerStatus> {
        match self {
            Self::PiJuice(pijuice) => or_warn("read power status", pijuice.status()),
            Self::Unavailable => None,
        }
    }

    pub fn is_battery_powered(&self) -> bool {
        self.power_status().is_some_and(|status| status.on_battery())
    }

    pub fn battery_info(&self) -> Option<BatteryInfo> {
        let Self::PiJuice(pijuice) = self else {
            return None;
        };
        let read = || -> pijuice::Result<BatteryInfo> {
            let status = pijuice.status()?;
            Ok(BatteryInfo {
                charge_level: pijuice.charge_level()? as f32 / 100.0,
                status: status.battery,
                power_input: status.power_input,
                power_input_5v: status.power_input_5v,
                temperature_c: pijuice.battery_temperature()?,
                voltage_mv: pijuice.battery_voltage()?,
                current_ma: pijuice.battery_current()?,
                io_voltage_mv: pijuice.io_voltage()?,
                io_current_ma: pijuice.io_current()?,
                faults: pijuice.faults()?,
                profile: pijuice.battery_profile()?,
            })
        };
        or_warn("read battery info", read())
    }

    pub fn enable_display_power(&self) {
        if let Self::PiJuice(pijuice) = self {
            or_warn(
                "enable display power",
                pijuice.set_system_power_switch(DISPLAY_CURRENT_MA),
            );
        }
    }

    pub fn set_current_time(&self, now: NaiveDateTime) {
        if let Self::PiJuice(pijuice) = self {
            or_warn("set the clock", pijuice.set_time(now));
        }
    }

    /// Only the hour and minute of `wakeup` are kept by the RTC.
    pub fn set_alarm(&self, wakeup: NaiveDateTime) {
        if let Self::PiJuice(pijuice) = self {
            or_warn("enable wake up", pijuice.set_wakeup_enabled(true));
            or_warn(
                "set the alarm",
                pijuice.set_alarm(wakeup.hour(), wakeup.minute()),
            );
        }
    }

    /// Ask the PiJuice to cut the power shortly, then halt the system.
    pub fn shutdown(&self) {
        if let Self::PiJuice(pijuice) = self {
            if or_warn("schedule power off", pijuice.set_power_off(POWER_OFF_DELAY)).is_none() {
                return;
            }
            info!("Shutting down");
            match Command::new("sudo").args(["shutdown", "-h", "now"]).status() {
                Ok(status) if status.success() => {}
                Ok(status) => warn!("shutdown exited with {}", status),
                Err(e) => warn!("Cannot run shutdown: {}", e),
            }
        }
    }
}
