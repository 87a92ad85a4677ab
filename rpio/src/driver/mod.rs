//! Peripheral driver adapter
//!
//! Every hardware effect goes through [`PeripheralDriver`]. The control layer
//! decides *when* registers are touched; the driver decides *how*.
//!
//! | Driver | Used when |
//! |--------|-----------|
//! | [`Bcm2835Driver`] | a BCM283x/BCM2711 SoC is detected (unix only) |
//! | [`NoopDriver`] | no supported hardware; every call does nothing |
//! | `MockDriver` | unit tests |

#[cfg(unix)]
pub mod bcm2835;
#[cfg(test)]
pub mod mock;
pub mod noop;

#[cfg(unix)]
pub use bcm2835::Bcm2835Driver;
pub use noop::NoopDriver;

use crate::error::Result;
use crate::gpio::{Level, Pin, PinFunction};
use crate::spi::{BitOrder, ChipSelect, DataMode};

/// Register-level primitives for GPIO and SPI0
///
/// Pin numbers are BCM lines and are not range-checked. Only `map` and
/// `spi_exchange` can fail.
pub trait PeripheralDriver {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// `false` for drivers that stand in for absent hardware. Operations on
    /// such a driver never need `start()`.
    fn is_hardware(&self) -> bool;

    /// Map the peripheral register blocks into this process
    fn map(&mut self) -> Result<()>;

    /// Release the register mappings
    fn unmap(&mut self);

    fn gpio_fsel(&mut self, pin: Pin, function: PinFunction);

    fn gpio_function(&self, pin: Pin) -> PinFunction;

    fn gpio_write(&mut self, pin: Pin, level: Level);

    fn gpio_level(&self, pin: Pin) -> Level;

    fn spi_chip_select(&mut self, cs: ChipSelect);

    fn spi_set_data_mode(&mut self, mode: DataMode);

    fn spi_set_bit_order(&mut self, order: BitOrder);

    fn spi_set_clock_divider(&mut self, divider: u16);

    /// Hand the SPI pins to the SPI0 controller
    fn spi_begin(&mut self);

    /// Clock `tx.len()` bytes out and the same number in. `rx` has the same
    /// length as `tx`.
    fn spi_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Return the SPI pins to plain GPIO inputs
    fn spi_end(&mut self);
}
