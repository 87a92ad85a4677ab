//! SPI Transfer Engine
//!
//! One call performs, in this order:
//!
//! 1. copy `length` bytes of the caller's buffer into an owned write buffer
//! 2. allocate an owned read buffer of `length` bytes
//! 3. write each auxiliary (pin, level) pair, in order
//! 4. assert the chip-select pin (drive LOW)
//! 5. begin the SPI transaction
//! 6. exchange `length` bytes full duplex
//! 7. end the SPI transaction
//! 8. deassert the chip-select pin (drive HIGH)
//! 9. hand the read buffer to the caller
//!
//! Steps 7 and 8 run on every exit path once step 5 has been reached. A fault
//! reported by the exchange is returned only after the chip select has been
//! released. Nothing is retried: the target device may already have acted on
//! the bytes it received.

use log::{debug, trace};

use crate::driver::PeripheralDriver;
use crate::error::{Error, Result};
use crate::gpio::{Level, Pin};
use crate::lifecycle::Rpio;

/// One (pin, level) write issued before chip select, e.g. to steer an
/// external demultiplexer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxPin {
    pub pin: Pin,
    pub level: Level,
}

impl AuxPin {
    pub const fn new(pin: Pin, level: Level) -> Self {
        Self { pin, level }
    }
}

/// Arguments of one transfer
#[derive(Clone, Copy, Debug)]
pub struct Transfer<'a> {
    write: &'a [u8],
    length: usize,
    aux_pins: &'a [AuxPin],
    chip_select: Option<Pin>,
}

impl<'a> Transfer<'a> {
    /// Exchange the first `length` bytes of `write`
    pub fn new(write: &'a [u8], length: usize) -> Self {
        Self {
            write,
            length,
            aux_pins: &[],
            chip_select: None,
        }
    }

    /// Exchange all of `write`
    pub fn full(write: &'a [u8]) -> Self {
        Self::new(write, write.len())
    }

    /// Pins written, in order, before the chip select is asserted
    pub fn aux_pins(mut self, pins: &'a [AuxPin]) -> Self {
        self.aux_pins = pins;
        self
    }

    /// Pin driven LOW around the exchange. Without one, device selection is
    /// left to the caller.
    pub fn chip_select(mut self, pin: Pin) -> Self {
        self.chip_select = Some(pin);
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

/// Holds a manual chip select asserted for as long as it lives
///
/// Deasserts on drop, so the line is released on early returns and unwinding
/// alike.
struct ChipSelectGuard<'d> {
    driver: &'d mut (dyn PeripheralDriver + Send),
    pin: Option<Pin>,
}

impl<'d> ChipSelectGuard<'d> {
    fn assert(driver: &'d mut (dyn PeripheralDriver + Send), pin: Option<Pin>) -> Self {
        if let Some(pin) = pin {
            trace!("spi: assert cs gpio{}", pin);
            driver.gpio_write(pin, Level::Low);
        }
        Self { driver, pin }
    }

    fn driver(&mut self) -> &mut (dyn PeripheralDriver + Send) {
        &mut *self.driver
    }
}

impl Drop for ChipSelectGuard<'_> {
    fn drop(&mut self) {
        if let Some(pin) = self.pin {
            trace!("spi: deassert cs gpio{}", pin);
            self.driver.gpio_write(pin, Level::High);
        }
    }
}

/// Run steps 3 to 8 against a driver
fn run(
    driver: &mut (dyn PeripheralDriver + Send),
    aux_pins: &[AuxPin],
    chip_select: Option<Pin>,
    tx: &[u8],
    rx: &mut [u8],
) -> Result<()> {
    for aux in aux_pins {
        driver.gpio_write(aux.pin, aux.level);
    }

    let mut cs = ChipSelectGuard::assert(driver, chip_select);
    let bus = cs.driver();
    bus.spi_begin();
    let exchanged = bus.spi_exchange(tx, rx);
    bus.spi_end();
    drop(cs);

    exchanged
}

impl Rpio {
    /// Full-duplex SPI transfer
    ///
    /// Returns the `length` bytes clocked in, or an empty buffer when
    /// `length` is zero. Fails with `InvalidArgument` if the write buffer is
    /// shorter than `length`, before any pin or register is touched.
    pub fn spi_transfer(&mut self, transfer: &Transfer<'_>) -> Result<Vec<u8>> {
        let length = transfer.length();
        if transfer.write.len() < length {
            return Err(Error::invalid(format!(
                "write buffer holds {} bytes, transfer needs {}",
                transfer.write.len(),
                length
            )));
        }

        // Pin numbers are resolved before anything is driven
        let aux_pins = transfer
            .aux_pins
            .iter()
            .map(|aux| Ok(AuxPin::new(self.resolve_pin(aux.pin)?, aux.level)))
            .collect::<Result<Vec<_>>>()?;
        let chip_select = transfer
            .chip_select
            .map(|pin| self.resolve_pin(pin))
            .transpose()?;

        let driver = self.driver_mut()?;

        let tx = transfer.write[..length].to_vec();
        let mut rx = vec![0u8; length];

        debug!(
            "spi: transfer {} bytes, {} aux pins, cs {:?}",
            length,
            aux_pins.len(),
            chip_select
        );
        run(driver, &aux_pins, chip_select, &tx, &mut rx)?;

        Ok(rx)
    }
}
