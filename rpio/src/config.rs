//! Configuration file (`rpio.toml`)
//!
//! ```toml
//! platform = "auto"        # auto | hardware | none
//! numbering = "physical"   # bcm | physical
//! peripheral_base = 0xFE000000
//! memory_device = "/dev/mem"
//!
//! [spi]
//! clock_divider = 128
//! data_mode = 0
//! bit_order = "msb"
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::spi::{divider, BitOrder, DataMode, SpiConfig};

pub const DEFAULT_MEMORY_DEVICE: &str = "/dev/mem";

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "rpio.toml";

/// Which driver backs the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    /// Probe the device tree
    #[default]
    Auto,
    /// Register driver, even if detection finds nothing
    Hardware,
    /// No-op driver
    None,
}

/// How pin arguments are numbered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinNumbering {
    /// BCM GPIO line numbers
    #[default]
    Bcm,
    /// 40-pin header positions
    Physical,
}

/// SPI settings applied after `start()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiSettings {
    pub clock_divider: u16,
    pub data_mode: u8,
    pub bit_order: BitOrder,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            clock_divider: divider::DIVIDER_256,
            data_mode: 0,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl SpiSettings {
    pub fn to_spi_config(&self) -> Result<SpiConfig> {
        Ok(SpiConfig {
            clock_divider: self.clock_divider,
            bit_order: self.bit_order,
            data_mode: DataMode::try_from(self.data_mode)
                .map_err(|e| Error::Config(format!("[spi] data_mode: {}", e)))?,
        })
    }
}

/// Contents of `rpio.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpioConfig {
    pub platform: PlatformChoice,
    pub numbering: PinNumbering,
    /// Physical peripheral base, overriding detection
    pub peripheral_base: Option<u64>,
    /// Device mapped for register access
    pub memory_device: PathBuf,
    pub spi: SpiSettings,
}

impl Default for RpioConfig {
    fn default() -> Self {
        Self {
            platform: PlatformChoice::Auto,
            numbering: PinNumbering::Bcm,
            peripheral_base: None,
            memory_device: PathBuf::from(DEFAULT_MEMORY_DEVICE),
            spi: SpiSettings::default(),
        }
    }
}

impl RpioConfig {
    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.spi.to_spi_config()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Load `path` if given, else `rpio.toml` if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
