//! # BCM283x / BCM2711 register driver
//!
//! Maps the GPIO and SPI0 register blocks from the physical memory device and
//! drives them with volatile 32-bit accesses.
//!
//! ## SPI0 pins
//!
//! | Function | BCM GPIO | Physical Pin |
//! |----------|----------|--------------|
//! | SCLK     | GPIO 11  | Pin 23       |
//! | MOSI     | GPIO 10  | Pin 19       |
//! | MISO     | GPIO 9   | Pin 21       |
//! | CE0      | GPIO 8   | Pin 24       |
//! | CE1      | GPIO 7   | Pin 26       |
//!
//! Only SCLK, MOSI and MISO are switched to ALT0 by `spi_begin`. CE0 and CE1
//! stay ordinary GPIOs so they can serve as manual chip selects.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::gpio::{Level, Pin, PinFunction};
use crate::spi::{reverse_bits, BitOrder, ChipSelect, DataMode};

use super::PeripheralDriver;

/// Offset of the GPIO block from the peripheral base
pub const GPIO_OFFSET: u64 = 0x20_0000;
/// Offset of the SPI0 block from the peripheral base
pub const SPI0_OFFSET: u64 = 0x20_4000;

const BLOCK_SIZE: usize = 4096;

/// GPIO register offsets
mod gpio_reg {
    pub const GPFSEL0: usize = 0x00;
    pub const GPSET0: usize = 0x1C;
    pub const GPCLR0: usize = 0x28;
    pub const GPLEV0: usize = 0x34;
}

/// SPI register offsets
mod spi_reg {
    /// Control and Status
    pub const CS: usize = 0x00;
    /// TX/RX FIFO
    pub const FIFO: usize = 0x04;
    /// Clock divider
    pub const CLK: usize = 0x08;
}

/// CS register bits
mod cs_bits {
    /// Chip select (2 bits)
    pub const CS_MASK: u32 = 0x03;
    /// Clock phase
    pub const CPHA: u32 = 1 << 2;
    /// Clock polarity
    pub const CPOL: u32 = 1 << 3;
    /// Clear TX FIFO
    pub const CLEAR_TX: u32 = 1 << 4;
    /// Clear RX FIFO
    pub const CLEAR_RX: u32 = 1 << 5;
    /// Transfer active
    pub const TA: u32 = 1 << 7;
    /// Transfer done
    pub const DONE: u32 = 1 << 16;
    /// RX FIFO contains data
    pub const RXD: u32 = 1 << 17;
    /// TX FIFO can accept data
    pub const TXD: u32 = 1 << 18;
}

/// SPI0 data pins handed to ALT0 for the duration of a transaction
const SPI_PINS: [Pin; 3] = [9, 10, 11];

/// `mmap` with a 64-bit offset; peripheral bases above 2 GiB do not fit a
/// 32-bit `off_t`
#[cfg(target_os = "linux")]
unsafe fn mmap_block(fd: i32, physical: u64) -> Result<*mut libc::c_void> {
    let offset = libc::off64_t::try_from(physical)
        .map_err(|_| Error::init(format!("address {:#x} out of range", physical)))?;
    Ok(libc::mmap64(
        ptr::null_mut(),
        BLOCK_SIZE,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        offset,
    ))
}

#[cfg(not(target_os = "linux"))]
unsafe fn mmap_block(fd: i32, physical: u64) -> Result<*mut libc::c_void> {
    let offset = libc::off_t::try_from(physical)
        .map_err(|_| Error::init(format!("address {:#x} out of range", physical)))?;
    Ok(libc::mmap(
        ptr::null_mut(),
        BLOCK_SIZE,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        offset,
    ))
}

/// One mmap'ed register block, unmapped on drop
struct Block {
    base: *mut u32,
}

impl Block {
    fn map(fd: i32, physical: u64) -> Result<Self> {
        // SAFETY: fresh shared mapping of a device file; the kernel picks the address
        let base = unsafe { mmap_block(fd, physical)? };
        if base == libc::MAP_FAILED {
            return Err(Error::init_io(
                format!("mmap of {:#x} failed", physical),
                io::Error::last_os_error(),
            ));
        }
        Ok(Self { base: base.cast() })
    }

    fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset < BLOCK_SIZE && offset % 4 == 0);
        // SAFETY: offset lies inside the mapped block
        unsafe { ptr::read_volatile(self.base.add(offset / 4)) }
    }

    fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset < BLOCK_SIZE && offset % 4 == 0);
        // SAFETY: offset lies inside the mapped block
        unsafe { ptr::write_volatile(self.base.add(offset / 4), value) }
    }

    /// Read-modify-write of the bits in `mask`
    fn set_bits(&self, offset: usize, value: u32, mask: u32) {
        let current = self.read(offset);
        self.write(offset, (current & !mask) | (value & mask));
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: base/BLOCK_SIZE came from a successful mmap
        unsafe {
            libc::munmap(self.base.cast(), BLOCK_SIZE);
        }
    }
}

/// Register driver for the SoC peripherals
pub struct Bcm2835Driver {
    peripheral_base: u64,
    device: PathBuf,
    gpio: Option<Block>,
    spi: Option<Block>,
    bit_order: BitOrder,
}

// SAFETY: the mappings are owned exclusively by this driver; the pointers are
// never shared, so moving the driver to another thread is sound.
unsafe impl Send for Bcm2835Driver {}

impl Bcm2835Driver {
    /// Driver for the peripherals at `peripheral_base`, mapped through `device`
    /// (normally `/dev/mem`)
    pub fn new(peripheral_base: u64, device: impl AsRef<Path>) -> Self {
        Self {
            peripheral_base,
            device: device.as_ref().to_path_buf(),
            gpio: None,
            spi: None,
            bit_order: BitOrder::MsbFirst,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.gpio.is_some() && self.spi.is_some()
    }

    fn fsel(gpio: &Block, pin: Pin, function: PinFunction) {
        let offset = gpio_reg::GPFSEL0 + usize::from(pin / 10) * 4;
        let shift = u32::from(pin % 10) * 3;
        gpio.set_bits(offset, function.bits() << shift, 0b111 << shift);
    }

    /// The FIFO loop of a single transaction: TA set, fill/drain, wait DONE,
    /// TA cleared
    fn transfernb(spi: &Block, tx: &[u8], rx: &mut [u8]) {
        spi.set_bits(
            spi_reg::CS,
            cs_bits::CLEAR_TX | cs_bits::CLEAR_RX,
            cs_bits::CLEAR_TX | cs_bits::CLEAR_RX,
        );
        spi.set_bits(spi_reg::CS, cs_bits::TA, cs_bits::TA);

        let mut tx_idx = 0;
        let mut rx_idx = 0;

        while tx_idx < tx.len() || rx_idx < rx.len() {
            // Fill TX FIFO while we can and have data
            while tx_idx < tx.len() && spi.read(spi_reg::CS) & cs_bits::TXD != 0 {
                spi.write(spi_reg::FIFO, u32::from(tx[tx_idx]));
                tx_idx += 1;
            }

            // Drain RX FIFO while data is available
            while rx_idx < rx.len() && spi.read(spi_reg::CS) & cs_bits::RXD != 0 {
                rx[rx_idx] = spi.read(spi_reg::FIFO) as u8;
                rx_idx += 1;
            }
        }

        while spi.read(spi_reg::CS) & cs_bits::DONE == 0 {}

        spi.set_bits(spi_reg::CS, 0, cs_bits::TA);
    }
}

impl PeripheralDriver for Bcm2835Driver {
    fn name(&self) -> &'static str {
        "bcm2835"
    }

    fn is_hardware(&self) -> bool {
        true
    }

    fn map(&mut self) -> Result<()> {
        if self.is_mapped() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&self.device)
            .map_err(|e| Error::init_io(format!("cannot open {}", self.device.display()), e))?;
        let fd = file.as_raw_fd();

        let gpio = Block::map(fd, self.peripheral_base + GPIO_OFFSET)?;
        let spi = Block::map(fd, self.peripheral_base + SPI0_OFFSET)?;
        self.gpio = Some(gpio);
        self.spi = Some(spi);

        info!(
            "mapped GPIO/SPI0 registers at {:#x} via {}",
            self.peripheral_base,
            self.device.display()
        );
        Ok(())
    }

    fn unmap(&mut self) {
        let was_mapped = self.gpio.is_some() || self.spi.is_some();
        self.gpio = None;
        self.spi = None;
        if was_mapped {
            debug!("unmapped GPIO/SPI0 registers");
        }
    }

    fn gpio_fsel(&mut self, pin: Pin, function: PinFunction) {
        if let Some(gpio) = &self.gpio {
            Self::fsel(gpio, pin, function);
        }
    }

    fn gpio_function(&self, pin: Pin) -> PinFunction {
        match &self.gpio {
            Some(gpio) => {
                let offset = gpio_reg::GPFSEL0 + usize::from(pin / 10) * 4;
                let shift = u32::from(pin % 10) * 3;
                PinFunction::from_bits(gpio.read(offset) >> shift)
            }
            None => PinFunction::Input,
        }
    }

    fn gpio_write(&mut self, pin: Pin, level: Level) {
        if let Some(gpio) = &self.gpio {
            let bank = usize::from(pin / 32) * 4;
            let bit = 1u32 << (pin % 32);
            match level {
                Level::High => gpio.write(gpio_reg::GPSET0 + bank, bit),
                Level::Low => gpio.write(gpio_reg::GPCLR0 + bank, bit),
            }
        }
    }

    fn gpio_level(&self, pin: Pin) -> Level {
        match &self.gpio {
            Some(gpio) => {
                let bank = usize::from(pin / 32) * 4;
                let bit = 1u32 << (pin % 32);
                Level::from(gpio.read(gpio_reg::GPLEV0 + bank) & bit != 0)
            }
            None => Level::Low,
        }
    }

    fn spi_chip_select(&mut self, cs: ChipSelect) {
        if let Some(spi) = &self.spi {
            spi.set_bits(spi_reg::CS, cs as u32, cs_bits::CS_MASK);
        }
    }

    fn spi_set_data_mode(&mut self, mode: DataMode) {
        if let Some(spi) = &self.spi {
            spi.set_bits(
                spi_reg::CS,
                (mode as u32) << 2,
                cs_bits::CPOL | cs_bits::CPHA,
            );
        }
    }

    fn spi_set_bit_order(&mut self, order: BitOrder) {
        // SPI0 shifts MSB first only; LSB first is done in software
        self.bit_order = order;
    }

    fn spi_set_clock_divider(&mut self, divider: u16) {
        if let Some(spi) = &self.spi {
            spi.write(spi_reg::CLK, u32::from(divider));
        }
    }

    fn spi_begin(&mut self) {
        if let Some(gpio) = &self.gpio {
            for pin in SPI_PINS {
                Self::fsel(gpio, pin, PinFunction::Alt0);
            }
        }
        if let Some(spi) = &self.spi {
            spi.set_bits(
                spi_reg::CS,
                cs_bits::CLEAR_TX | cs_bits::CLEAR_RX,
                cs_bits::CLEAR_TX | cs_bits::CLEAR_RX,
            );
        }
    }

    fn spi_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let spi = self
            .spi
            .as_ref()
            .ok_or_else(|| Error::TransferFailed("SPI0 registers are not mapped".to_string()))?;
        if tx.len() != rx.len() {
            return Err(Error::TransferFailed(format!(
                "buffer length mismatch: tx {} rx {}",
                tx.len(),
                rx.len()
            )));
        }

        match self.bit_order {
            BitOrder::MsbFirst => Self::transfernb(spi, tx, rx),
            BitOrder::LsbFirst => {
                let mut reversed = tx.to_vec();
                reverse_bits(&mut reversed);
                Self::transfernb(spi, &reversed, rx);
                reverse_bits(rx);
            }
        }
        Ok(())
    }

    fn spi_end(&mut self) {
        if let Some(gpio) = &self.gpio {
            for pin in SPI_PINS {
                Self::fsel(gpio, pin, PinFunction::Input);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    /// Driver mapped over a sparse file standing in for physical memory,
    /// with the peripheral base at offset 0
    fn mapped() -> (Bcm2835Driver, NamedTempFile) {
        let mem = NamedTempFile::new().unwrap();
        mem.as_file().set_len(SPI0_OFFSET + BLOCK_SIZE as u64).unwrap();
        let mut driver = Bcm2835Driver::new(0, mem.path());
        driver.map().unwrap();
        (driver, mem)
    }

    fn gpio_word(driver: &Bcm2835Driver, offset: usize) -> u32 {
        driver.gpio.as_ref().unwrap().read(offset)
    }

    fn spi_word(driver: &Bcm2835Driver, offset: usize) -> u32 {
        driver.spi.as_ref().unwrap().read(offset)
    }

    #[test]
    fn test_fsel_register_and_shift() {
        let (mut driver, _mem) = mapped();

        // GPIO 17 is GPFSEL1 bits 23:21
        driver.gpio_fsel(17, PinFunction::Output);
        assert_eq!(gpio_word(&driver, 0x04), 0x0020_0000);

        // GPIO 10 shares GPFSEL1 and is left alone by GPIO 17
        driver.gpio_fsel(10, PinFunction::Alt0);
        assert_eq!(gpio_word(&driver, 0x04), 0x0020_0004);
        driver.gpio_fsel(17, PinFunction::Input);
        assert_eq!(gpio_word(&driver, 0x04), 0x0000_0004);

        driver.gpio_fsel(4, PinFunction::Output);
        assert_eq!(gpio_word(&driver, 0x00), 0x0000_1000);
        assert_eq!(driver.gpio_function(4), PinFunction::Output);
        assert_eq!(driver.gpio_function(10), PinFunction::Alt0);
    }

    #[test]
    fn test_write_selects_set_or_clear_bank() {
        let (mut driver, _mem) = mapped();

        driver.gpio_write(4, Level::High);
        assert_eq!(gpio_word(&driver, gpio_reg::GPSET0), 1 << 4);
        assert_eq!(gpio_word(&driver, gpio_reg::GPCLR0), 0);

        // GPIO 40 is bit 8 of the second bank
        driver.gpio_write(40, Level::Low);
        assert_eq!(gpio_word(&driver, gpio_reg::GPCLR0 + 4), 1 << 8);
        assert_eq!(gpio_word(&driver, gpio_reg::GPSET0 + 4), 0);
    }

    #[test]
    fn test_level_reads_lev_bank() {
        let (driver, _mem) = mapped();
        let gpio = driver.gpio.as_ref().unwrap();
        gpio.write(gpio_reg::GPLEV0, 1 << 22);
        gpio.write(gpio_reg::GPLEV0 + 4, 1 << 3);

        assert_eq!(driver.gpio_level(22), Level::High);
        assert_eq!(driver.gpio_level(21), Level::Low);
        assert_eq!(driver.gpio_level(35), Level::High);
        assert_eq!(driver.gpio_level(3), Level::Low);
    }

    #[test]
    fn test_spi_mode_and_chip_select_bits() {
        let (mut driver, _mem) = mapped();

        driver.spi_set_data_mode(DataMode::Mode2);
        driver.spi_chip_select(ChipSelect::None);
        assert_eq!(spi_word(&driver, spi_reg::CS), cs_bits::CPOL | 0b11);

        driver.spi_set_data_mode(DataMode::Mode1);
        driver.spi_chip_select(ChipSelect::Cs1);
        assert_eq!(spi_word(&driver, spi_reg::CS), cs_bits::CPHA | 0b01);

        driver.spi_set_clock_divider(256);
        assert_eq!(spi_word(&driver, spi_reg::CLK), 256);
    }

    #[test]
    fn test_begin_and_end_switch_spi_pins() {
        let (mut driver, _mem) = mapped();
        driver.gpio_fsel(8, PinFunction::Output);
        driver.gpio_fsel(7, PinFunction::Output);

        driver.spi_begin();
        for pin in SPI_PINS {
            assert_eq!(driver.gpio_function(pin), PinFunction::Alt0);
        }
        // GPIO 9 is GPFSEL0 bits 29:27; GPIO 10 and 11 are GPFSEL1 bits 5:0
        assert_eq!(gpio_word(&driver, 0x00) >> 27, 0b100);
        assert_eq!(gpio_word(&driver, 0x04) & 0x3F, 0b100_100);
        let cs = spi_word(&driver, spi_reg::CS);
        assert_eq!(
            cs & (cs_bits::CLEAR_TX | cs_bits::CLEAR_RX),
            cs_bits::CLEAR_TX | cs_bits::CLEAR_RX
        );

        // Manual chip-select lines are untouched
        assert_eq!(driver.gpio_function(8), PinFunction::Output);
        assert_eq!(driver.gpio_function(7), PinFunction::Output);

        driver.spi_end();
        for pin in SPI_PINS {
            assert_eq!(driver.gpio_function(pin), PinFunction::Input);
        }
        assert_eq!(driver.gpio_function(8), PinFunction::Output);
    }

    #[test]
    fn test_unmap_releases_blocks() {
        let (mut driver, _mem) = mapped();
        assert!(driver.is_mapped());
        driver.unmap();
        assert!(!driver.is_mapped());
        assert_eq!(driver.gpio_function(17), PinFunction::Input);
    }

    #[test]
    fn test_unmapped_driver_is_inert() {
        let mut driver = Bcm2835Driver::new(0x3F00_0000, "/nonexistent/mem");
        assert!(!driver.is_mapped());

        driver.gpio_fsel(4, PinFunction::Output);
        driver.gpio_write(4, Level::High);
        assert_eq!(driver.gpio_level(4), Level::Low);
        assert_eq!(driver.gpio_function(4), PinFunction::Input);

        let mut rx = [0u8; 1];
        assert!(matches!(
            driver.spi_exchange(&[0x01], &mut rx),
            Err(Error::TransferFailed(_))
        ));
    }

    #[test]
    fn test_map_missing_device_fails() {
        let mut driver = Bcm2835Driver::new(0xFE00_0000, "/nonexistent/mem");
        let err = driver.map().unwrap_err();
        assert!(matches!(err, Error::InitializationFailed { .. }));
        assert!(!driver.is_mapped());
    }
}
