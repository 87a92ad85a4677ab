//! SPI session configuration
//!
//! Clock divider, bit order and data mode are peripheral-global. Each setter
//! is a single register write that stays in effect for every later transfer
//! until it is changed again.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lifecycle::Rpio;

/// Hardware chip-select lines of SPI0 (CS register bits 1:0)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChipSelect {
    /// CE0 (GPIO 8)
    Cs0 = 0,
    /// CE1 (GPIO 7)
    Cs1 = 1,
    /// CE2 (not brought out on the header)
    Cs2 = 2,
    /// No automatic chip select. Selection is done with GPIO writes.
    None = 3,
}

/// SPI mode (CPOL, CPHA)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0 = 0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1 = 1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2 = 2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3 = 3,
}

impl DataMode {
    pub const fn cpol(self) -> bool {
        (self as u8) & 0b10 != 0
    }

    pub const fn cpha(self) -> bool {
        (self as u8) & 0b01 != 0
    }
}

impl TryFrom<u8> for DataMode {
    type Error = Error;

    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            0 => Ok(DataMode::Mode0),
            1 => Ok(DataMode::Mode1),
            2 => Ok(DataMode::Mode2),
            3 => Ok(DataMode::Mode3),
            other => Err(Error::invalid(format!("SPI data mode must be 0-3, got {}", other))),
        }
    }
}

/// Bit order of each transferred byte
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitOrder {
    #[serde(rename = "lsb")]
    LsbFirst = 0,
    #[serde(rename = "msb")]
    MsbFirst = 1,
}

impl TryFrom<u8> for BitOrder {
    type Error = Error;

    fn try_from(order: u8) -> Result<Self> {
        match order {
            0 => Ok(BitOrder::LsbFirst),
            1 => Ok(BitOrder::MsbFirst),
            other => Err(Error::invalid(format!(
                "SPI bit order must be 0 (LSB first) or 1 (MSB first), got {}",
                other
            ))),
        }
    }
}

/// Common clock dividers. SPI clock = core clock / divider; 0 means 65536.
pub mod divider {
    pub const DIVIDER_65536: u16 = 0;
    pub const DIVIDER_32768: u16 = 32768;
    pub const DIVIDER_16384: u16 = 16384;
    pub const DIVIDER_8192: u16 = 8192;
    pub const DIVIDER_4096: u16 = 4096;
    pub const DIVIDER_2048: u16 = 2048;
    pub const DIVIDER_1024: u16 = 1024;
    pub const DIVIDER_512: u16 = 512;
    pub const DIVIDER_256: u16 = 256;
    pub const DIVIDER_128: u16 = 128;
    pub const DIVIDER_64: u16 = 64;
    pub const DIVIDER_32: u16 = 32;
    pub const DIVIDER_16: u16 = 16;
    pub const DIVIDER_8: u16 = 8;
    pub const DIVIDER_4: u16 = 4;
    pub const DIVIDER_2: u16 = 2;
}

/// SPI bus clock in Hz for a given core clock and CLK register value
pub fn clock_hz(core_clock_hz: u32, clock_divider: u16) -> u32 {
    let cdiv = match clock_divider {
        0 => 65536,
        // CDIV is rounded down to an even value
        d => (u32::from(d) & !1).max(1),
    };
    core_clock_hz / cdiv
}

/// Reverse the bit order of every byte in `buffer`
pub fn reverse_bits(buffer: &mut [u8]) {
    for byte in buffer {
        *byte = byte.reverse_bits();
    }
}

/// Mirror of the peripheral-global SPI settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpiConfig {
    /// Core clock divider written to the CLK register
    pub clock_divider: u16,
    pub bit_order: BitOrder,
    pub data_mode: DataMode,
}

impl Default for SpiConfig {
    /// Power-on state of SPI0 as used after `start()`
    fn default() -> Self {
        Self {
            clock_divider: divider::DIVIDER_65536,
            bit_order: BitOrder::MsbFirst,
            data_mode: DataMode::Mode0,
        }
    }
}

impl Rpio {
    /// Set SPI clock polarity and phase
    pub fn spi_set_data_mode(&mut self, mode: DataMode) -> Result<()> {
        self.driver_mut()?.spi_set_data_mode(mode);
        self.spi_mut().data_mode = mode;
        debug!("spi: data mode {:?}", mode);
        Ok(())
    }

    /// Set SPI bit order
    pub fn spi_set_bit_order(&mut self, order: BitOrder) -> Result<()> {
        self.driver_mut()?.spi_set_bit_order(order);
        self.spi_mut().bit_order = order;
        debug!("spi: bit order {:?}", order);
        Ok(())
    }

    /// Set the SPI clock divider
    ///
    /// Any 16-bit value is written as-is. Odd values are rounded down by the
    /// hardware and produce a different clock than requested.
    pub fn spi_set_clock_divider(&mut self, clock_divider: u16) -> Result<()> {
        if clock_divider > 1 && clock_divider % 2 == 1 {
            warn!(
                "spi: clock divider {} is odd, hardware will use {}",
                clock_divider,
                clock_divider & !1
            );
        }
        self.driver_mut()?.spi_set_clock_divider(clock_divider);
        self.spi_mut().clock_divider = clock_divider;
        debug!("spi: clock divider {}", clock_divider);
        Ok(())
    }

    /// Apply all three settings
    pub fn spi_configure(&mut self, config: SpiConfig) -> Result<()> {
        self.spi_set_clock_divider(config.clock_divider)?;
        self.spi_set_bit_order(config.bit_order)?;
        self.spi_set_data_mode(config.data_mode)
    }
}
