//! PiJuice HAT, spoken to over I2C.

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use rppal::i2c::I2c;
use serde::Serialize;
use thiserror::Error;

const BUS: u8 = 1;
const ADDRESS: u16 = 0x14;

const STATUS_CMD: u8 = 0x40;
const CHARGE_LEVEL_CMD: u8 = 0x41;
const FAULT_EVENT_CMD: u8 = 0x44;
const BATTERY_TEMPERATURE_CMD: u8 = 0x47;
const BATTERY_VOLTAGE_CMD: u8 = 0x49;
const BATTERY_CURRENT_CMD: u8 = 0x4B;
const IO_VOLTAGE_CMD: u8 = 0x4D;
const IO_CURRENT_CMD: u8 = 0x4F;
const BATTERY_PROFILE_STATUS_CMD: u8 = 0x52;
const POWER_OFF_CMD: u8 = 0x62;
const SYSTEM_POWER_SWITCH_CTRL_CMD: u8 = 0x63;
const RTC_TIME_CMD: u8 = 0xB0;
const RTC_ALARM_CMD: u8 = 0xB9;
const RTC_CTRL_STATUS_CMD: u8 = 0xC2;

pub type Result<T> = std::result::Result<T, PiJuiceError>;

#[derive(Error, Debug)]
pub enum PiJuiceError {
    #[error(transparent)]
    I2c(#[from] rppal::i2c::Error),
    #[error("bad checksum reading command {0:#04x}")]
    Checksum(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    Normal,
    ChargingFromIn,
    #[serde(rename = "CHARGING_FROM_5V_IO")]
    ChargingFrom5vIo,
    NotPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputStatus {
    NotPresent,
    Bad,
    Weak,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PowerStatus {
    pub is_fault: bool,
    pub is_button: bool,
    pub battery: BatteryStatus,
    pub power_input: InputStatus,
    pub power_input_5v: InputStatus,
}

impl PowerStatus {
    fn from_byte(d: u8) -> Self {
        const BATTERY: [BatteryStatus; 4] = [
            BatteryStatus::Normal,
            BatteryStatus::ChargingFromIn,
            BatteryStatus::ChargingFrom5vIo,
            BatteryStatus::NotPresent,
        ];
        const INPUT: [InputStatus; 4] = [
            InputStatus::NotPresent,
            InputStatus::Bad,
            InputStatus::Weak,
            InputStatus::Present,
        ];
        Self {
            is_fault: d & 0x01 != 0,
            is_button: d & 0x02 != 0,
            battery: BATTERY[((d >> 2) & 0x03) as usize],
            power_input: INPUT[((d >> 4) & 0x03) as usize],
            power_input_5v: INPUT[((d >> 6) & 0x03) as usize],
        }
    }

    /// Neither the micro USB input nor the GPIO 5V rail is powered.
    pub fn on_battery(&self) -> bool {
        self.power_input == InputStatus::NotPresent && self.power_input_5v == InputStatus::NotPresent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Faults {
    pub button_power_off: bool,
    pub forced_power_off: bool,
    pub forced_sys_power_off: bool,
    pub watchdog_reset: bool,
    pub battery_profile_invalid: bool,
    pub charging_temperature_fault: &'static str,
}

impl Faults {
    fn from_byte(d: u8) -> Self {
        const TEMPERATURE: [&str; 4] = ["NORMAL", "SUSPEND", "COOL", "WARM"];
        Self {
            button_power_off: d & 0x01 != 0,
            forced_power_off: d & 0x02 != 0,
            forced_sys_power_off: d & 0x04 != 0,
            watchdog_reset: d & 0x08 != 0,
            battery_profile_invalid: d & 0x20 != 0,
            charging_temperature_fault: TEMPERATURE[((d >> 6) & 0x03) as usize],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryProfile {
    pub id: u8,
    pub custom: bool,
    pub source: &'static str,
    pub valid: bool,
}

impl BatteryProfile {
    fn from_byte(d: u8) -> Self {
        const SOURCE: [&str; 4] = ["HOST", "DIP_SWITCH", "RESISTOR", "UNKNOWN"];
        Self {
            id: d & 0x0F,
            custom: d & 0x10 != 0,
            source: SOURCE[((d >> 5) & 0x03) as usize],
            valid: d & 0x80 == 0,
        }
    }
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0xFF, |fcs, x| fcs ^ x)
}

fn bcd(value: u32) -> u8 {
    (((value / 10) as u8 & 0x0F) << 4) | ((value % 10) as u8 & 0x0F)
}

fn signed(d: &[u8]) -> i16 {
    i16::from_le_bytes([d[0], d[1]])
}

fn unsigned(d: &[u8]) -> u16 {
    u16::from_le_bytes([d[0], d[1]])
}

pub struct PiJuice {
    i2c: I2c,
}

impl PiJuice {
    /// Open the bus and make sure a PiJuice answers.
    pub fn new() -> Result<Self> {
        let mut i2c = I2c::with_bus(BUS)?;
        i2c.set_slave_address(ADDRESS)?;
        let pijuice = Self { i2c };
        pijuice.status()?;
        Ok(pijuice)
    }

    fn read(&self, command: u8, length: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; length + 1];
        self.i2c.block_read(command, &mut buffer)?;
        let fcs = buffer[length];
        let mut data = buffer;
        data.truncate(length);
        if checksum(&data) != fcs {
            // The firmware sometimes drops the top bit of the first byte.
            data[0] |= 0x80;
            if checksum(&data) != fcs {
                return Err(PiJuiceError::Checksum(command));
            }
        }
        Ok(data)
    }

    fn write(&self, command: u8, data: &[u8]) -> Result<()> {
        let mut buffer = data.to_vec();
        buffer.push(checksum(data));
        debug!("PiJuice write {:#04x} {:02x?}", command, buffer);
        self.i2c.block_write(command, &buffer)?;
        Ok(())
    }

    pub fn status(&self) -> Result<PowerStatus> {
        Ok(PowerStatus::from_byte(self.read(STATUS_CMD, 1)?[0]))
    }

    /// Percentage.
    pub fn charge_level(&self) -> Result<u8> {
        Ok(self.read(CHARGE_LEVEL_CMD, 1)?[0])
    }

    /// Degrees Celsius.
    pub fn battery_temperature(&self) -> Result<i16> {
        Ok(self.read(BATTERY_TEMPERATURE_CMD, 2)?[0] as i8 as i16)
    }

    /// Millivolts.
    pub fn battery_voltage(&self) -> Result<u16> {
        Ok(unsigned(&self.read(BATTERY_VOLTAGE_CMD, 2)?))
    }

    /// Milliamperes, negative when charging.
    pub fn battery_current(&self) -> Result<i16> {
        Ok(signed(&self.read(BATTERY_CURRENT_CMD, 2)?))
    }

    pub fn io_voltage(&self) -> Result<u16> {
        Ok(unsigned(&self.read(IO_VOLTAGE_CMD, 2)?))
    }

    pub fn io_current(&self) -> Result<i16> {
        Ok(signed(&self.read(IO_CURRENT_CMD, 2)?))
    }

    pub fn faults(&self) -> Result<Faults> {
        Ok(Faults::from_byte(self.read(FAULT_EVENT_CMD, 1)?[0]))
    }

    pub fn battery_profile(&self) -> Result<BatteryProfile> {
        Ok(BatteryProfile::from_byte(
            self.read(BATTERY_PROFILE_STATUS_CMD, 1)?[0],
        ))
    }

    /// Switch the system power output, in milliamperes (0 turns it off).
    pub fn set_system_power_switch(&self, milliamperes: u32) -> Result<()> {
        self.write(
            SYSTEM_POWER_SWITCH_CTRL_CMD,
            &[(milliamperes / 100).min(u8::MAX as u32) as u8],
        )
    }

    /// Cut the power after `delay` seconds.
    pub fn set_power_off(&self, delay: u8) -> Result<()> {
        self.write(POWER_OFF_CMD, &[delay])
    }

    pub fn set_time(&self, time: NaiveDateTime) -> Result<()> {
        self.write(RTC_TIME_CMD, &rtc_time(time))
    }

    /// Wake up every day at `hour:minute`.
    pub fn set_alarm(&self, hour: u32, minute: u32) -> Result<()> {
        self.write(RTC_ALARM_CMD, &rtc_alarm(hour, minute))
    }

    pub fn set_wakeup_enabled(&self, enabled: bool) -> Result<()> {
        let mut control = self.read(RTC_CTRL_STATUS_CMD, 2)?;
        if enabled {
            control[0] |= 0x01;
        } else {
            control[0] &= 0xFE;
        }
        // Clear a pending alarm flag.
        control[1] &= 0xFE;
        self.write(RTC_CTRL_STATUS_CMD, &control)
    }
}

fn rtc_time(time: NaiveDateTime) -> [u8; 9] {
    [
        bcd(time.second()),
        bcd(time.minute()),
        // 24-hour format.
        bcd(time.hour()) & 0x3F,
        time.weekday().number_from_monday() as u8,
        bcd(time.day()),
        bcd(time.month()),
        bcd((time.year() - 2000).clamp(0, 99) as u32),
        0,
        0,
    ]
}

fn rtc_alarm(hour: u32, minute: u32) -> [u8; 9] {
    [
        0,
        bcd(minute),
        bcd(hour) & 0x3F,
        // Every day of the week.
        0x80,
        0,
        0,
        0,
        0,
        0,
    ]
}
