//! Pin Control
//!
//! Sets a pin's function and reads or writes its digital level. Pin numbers
//! are passed through to the driver without range checks; values the SoC does
//! not implement have no defined effect on hardware.

use log::debug;

use crate::error::Result;
use crate::lifecycle::Rpio;

/// GPIO line number. BCM numbering unless the context uses physical numbering.
pub type Pin = u8;

/// Function-select value of a pin (3 bits per pin in GPFSELn)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinFunction {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

impl PinFunction {
    /// Raw GPFSEL field value
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode a GPFSEL field. Only the low three bits are used.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b000 => PinFunction::Input,
            0b001 => PinFunction::Output,
            0b100 => PinFunction::Alt0,
            0b101 => PinFunction::Alt1,
            0b110 => PinFunction::Alt2,
            0b111 => PinFunction::Alt3,
            0b011 => PinFunction::Alt4,
            _ => PinFunction::Alt5,
        }
    }
}

/// Logic level of a pin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl Level {
    /// Any non-zero value is HIGH
    pub const fn from_int(value: i64) -> Self {
        if value != 0 {
            Level::High
        } else {
            Level::Low
        }
    }

    pub const fn as_int(self) -> i64 {
        self as i64
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

impl Rpio {
    /// Configure a pin's function
    pub fn set_function(&mut self, pin: Pin, function: PinFunction) -> Result<()> {
        let line = self.resolve_pin(pin)?;
        debug!("gpio{}: function {:?}", line, function);
        self.driver_mut()?.gpio_fsel(line, function);
        Ok(())
    }

    /// Configure a pin as a digital input
    pub fn set_input(&mut self, pin: Pin) -> Result<()> {
        self.set_function(pin, PinFunction::Input)
    }

    /// Configure a pin as a digital output
    pub fn set_output(&mut self, pin: Pin) -> Result<()> {
        self.set_function(pin, PinFunction::Output)
    }

    /// Current function of a pin, as read back from the function-select register
    pub fn function(&mut self, pin: Pin) -> Result<PinFunction> {
        let line = self.resolve_pin(pin)?;
        Ok(self.driver_mut()?.gpio_function(line))
    }

    /// Sample a pin's level
    pub fn read(&mut self, pin: Pin) -> Result<Level> {
        let line = self.resolve_pin(pin)?;
        Ok(self.driver_mut()?.gpio_level(line))
    }

    /// Drive a pin's output latch
    ///
    /// Only visible on the pin while it is configured as an output. The write
    /// is not read back.
    pub fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        let line = self.resolve_pin(pin)?;
        self.driver_mut()?.gpio_write(line, level);
        Ok(())
    }
}
