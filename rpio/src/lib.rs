//! # rpio: GPIO and SPI0 control for Raspberry Pi
//!
//! Low-level control layer for the BCM283x/BCM2711 GPIO block and the SPI0
//! master, meant to be driven by a higher-level host process.
//!
//! - **Pins**: set input/output, read and write levels
//! - **SPI**: clock divider, bit order, data mode, full-duplex transfers
//! - **Manual chip select**: any GPIO can select the target device, with an
//!   optional list of auxiliary pin writes before it
//!
//! # Architecture
//!
//! ```text
//!   host::Binding          (argument checks, dynamic values)
//!        │
//!        ▼
//!   ┌──────────┐  Pin Control / SPI Config / Transfer Engine
//!   │   Rpio   │  initialization guard, SPI settings mirror
//!   └────┬─────┘
//!        ▼
//!   PeripheralDriver  ── Bcm2835Driver (mmap) | NoopDriver | MockDriver
//!        │
//!        ▼
//!   BCM283x / BCM2711 registers
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rpio::{Level, Rpio, Transfer, AuxPin};
//!
//! let mut rpio = Rpio::detect();
//! rpio.start()?;
//!
//! rpio.set_output(7)?;
//! rpio.write(7, Level::High)?;
//! rpio.spi_set_clock_divider(128)?;
//!
//! let mux = [AuxPin::new(5, Level::High), AuxPin::new(6, Level::Low)];
//! let rx = rpio.spi_transfer(&Transfer::full(&[0x9F, 0, 0]).aux_pins(&mux).chip_select(7))?;
//! println!("{:02x?}", rx);
//! # Ok::<(), rpio::Error>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod gpio;
pub mod header;
pub mod host;
pub mod lifecycle;
pub mod platform;
pub mod spi;

pub use config::{PinNumbering, PlatformChoice, RpioConfig};
pub use driver::PeripheralDriver;
pub use error::{Error, Result};
pub use gpio::{Level, Pin, PinFunction};
pub use lifecycle::{EffectiveUser, FixedPrivilege, Privilege, Rpio};
pub use platform::Platform;
pub use spi::{AuxPin, BitOrder, ChipSelect, DataMode, SpiConfig, Transfer};

/// Logic LOW
pub const LOW: Level = Level::Low;
/// Logic HIGH
pub const HIGH: Level = Level::High;
