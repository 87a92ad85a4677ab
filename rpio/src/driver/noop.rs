//! Driver for machines without GPIO hardware

use crate::error::Result;
use crate::gpio::{Level, Pin, PinFunction};
use crate::spi::{BitOrder, ChipSelect, DataMode};

use super::PeripheralDriver;

/// Accepts every call and touches nothing
///
/// Lets host-side code run off-device. Reads return LOW and pins report
/// INPUT; exchanges leave the read buffer as it was.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDriver;

impl PeripheralDriver for NoopDriver {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn is_hardware(&self) -> bool {
        false
    }

    fn map(&mut self) -> Result<()> {
        Ok(())
    }

    fn unmap(&mut self) {}

    fn gpio_fsel(&mut self, _pin: Pin, _function: PinFunction) {}

    fn gpio_function(&self, _pin: Pin) -> PinFunction {
        PinFunction::Input
    }

    fn gpio_write(&mut self, _pin: Pin, _level: Level) {}

    fn gpio_level(&self, _pin: Pin) -> Level {
        Level::Low
    }

    fn spi_chip_select(&mut self, _cs: ChipSelect) {}

    fn spi_set_data_mode(&mut self, _mode: DataMode) {}

    fn spi_set_bit_order(&mut self, _order: BitOrder) {}

    fn spi_set_clock_divider(&mut self, _divider: u16) {}

    fn spi_begin(&mut self) {}

    fn spi_exchange(&mut self, _tx: &[u8], _rx: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn spi_end(&mut self) {}
}
