//! SPI0 configuration and transfers
//!
//! Hardware chip selects are disabled by `start()`. Devices are selected
//! by driving an ordinary GPIO low around each transfer. The transfer can
//! optionally write a list of auxiliary pins first, which lets a single
//! select line fan out through an external demultiplexer.

pub mod config;
pub mod transfer;

pub use config::{clock_hz, divider, reverse_bits, BitOrder, ChipSelect, DataMode, SpiConfig};
pub use transfer::{AuxPin, Transfer};
