//! Privilege & Lifecycle Manager
//!
//! [`Rpio`] is the handle every operation goes through. It owns the driver,
//! the initialized flag and the mirror of the SPI settings. Nothing is global:
//! two contexts built over two mock drivers are fully independent.
//!
//! On a hardware-capable driver, pin and SPI operations fail with
//! `NotInitialized` until [`Rpio::start`] succeeds. On the no-op driver they
//! succeed without doing anything.

use log::{debug, info, warn};

use crate::config::{PinNumbering, RpioConfig};
use crate::driver::PeripheralDriver;
use crate::error::{Error, Result};
use crate::gpio::Pin;
use crate::header;
use crate::platform::{self, Platform};
use crate::spi::{ChipSelect, SpiConfig};

/// Source of the "may this process map physical memory" answer
pub trait Privilege {
    fn is_superuser(&self) -> bool;
}

/// Checks the effective user id of the running process
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectiveUser;

impl Privilege for EffectiveUser {
    #[cfg(unix)]
    fn is_superuser(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    fn is_superuser(&self) -> bool {
        false
    }
}

/// Fixed answer, for tests and simulated platforms
#[derive(Debug, Clone, Copy)]
pub struct FixedPrivilege(pub bool);

impl Privilege for FixedPrivilege {
    fn is_superuser(&self) -> bool {
        self.0
    }
}

/// GPIO/SPI context
///
/// Not internally synchronized. Callers sharing one context between threads
/// must serialize every call, configuration and transfers alike, behind a
/// single lock.
pub struct Rpio {
    driver: Box<dyn PeripheralDriver + Send>,
    privilege: Box<dyn Privilege + Send>,
    numbering: PinNumbering,
    spi_defaults: SpiConfig,
    spi: SpiConfig,
    started: bool,
}

impl Rpio {
    /// Context over an explicit driver and privilege probe, BCM numbering
    pub fn new(
        driver: Box<dyn PeripheralDriver + Send>,
        privilege: Box<dyn Privilege + Send>,
    ) -> Self {
        Self {
            driver,
            privilege,
            numbering: PinNumbering::Bcm,
            spi_defaults: SpiConfig::default(),
            spi: SpiConfig::default(),
            started: false,
        }
    }

    /// Detect the platform, pick a driver and apply the configuration
    pub fn from_config(config: &RpioConfig) -> Result<Self> {
        let platform = platform::select(config.platform, config.peripheral_base);
        let spi_defaults = config.spi.to_spi_config()?;
        let driver = platform.driver(&config.memory_device);
        info!("platform {} (driver {})", platform, driver.name());

        Ok(Self::new(driver, Box::new(EffectiveUser))
            .with_numbering(config.numbering)
            .with_spi_defaults(spi_defaults))
    }

    /// Context for the detected platform with default settings
    pub fn detect() -> Self {
        let platform: Platform = platform::detect();
        info!("platform {}", platform);
        Self::new(
            platform.driver(crate::config::DEFAULT_MEMORY_DEVICE),
            Box::new(EffectiveUser),
        )
    }

    /// Interpret pin arguments as BCM lines or header positions
    pub fn with_numbering(mut self, numbering: PinNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// SPI settings applied right after a successful `start()`, in place of
    /// the SPI0 power-on values
    pub fn with_spi_defaults(mut self, config: SpiConfig) -> Self {
        self.spi_defaults = config;
        self
    }

    /// Initialize the peripheral interface
    ///
    /// Checks privilege, maps the registers and deselects every hardware
    /// chip-select line so selection is left to GPIO writes. Then writes the
    /// SPI defaults, so the settings mirror matches the registers from here
    /// on. A no-op on platforms without the hardware, and after a previous
    /// success.
    pub fn start(&mut self) -> Result<()> {
        if !self.driver.is_hardware() {
            warn!("no GPIO hardware present, all operations are no-ops");
            self.started = true;
            return Ok(());
        }
        if self.started {
            debug!("already started");
            return Ok(());
        }

        if !self.privilege.is_superuser() {
            return Err(Error::PermissionDenied);
        }

        self.driver.map()?;
        self.driver.spi_chip_select(ChipSelect::None);
        self.started = true;
        info!("started ({} driver)", self.driver.name());

        self.spi_configure(self.spi_defaults)
    }

    /// Release the register mapping. `start()` may be called again afterwards.
    pub fn stop(&mut self) {
        if self.started {
            self.driver.unmap();
            self.started = false;
            debug!("stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// `false` when running over the no-op driver
    pub fn is_hardware(&self) -> bool {
        self.driver.is_hardware()
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn numbering(&self) -> PinNumbering {
        self.numbering
    }

    /// SPI settings last written through this context
    ///
    /// Holds the power-on values until `start()` has written the defaults.
    pub fn spi_config(&self) -> SpiConfig {
        self.spi
    }

    pub(crate) fn spi_mut(&mut self) -> &mut SpiConfig {
        &mut self.spi
    }

    /// Driver access behind the initialization guard
    pub(crate) fn driver_mut(&mut self) -> Result<&mut (dyn PeripheralDriver + Send)> {
        if self.driver.is_hardware() && !self.started {
            return Err(Error::NotInitialized);
        }
        Ok(self.driver.as_mut())
    }

    /// Translate a caller pin number to a BCM line
    pub(crate) fn resolve_pin(&self, pin: Pin) -> Result<Pin> {
        match self.numbering {
            PinNumbering::Bcm => Ok(pin),
            PinNumbering::Physical => header::bcm_for_physical(pin),
        }
    }
}

impl std::fmt::Debug for Rpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rpio")
            .field("driver", &self.driver.name())
            .field("numbering", &self.numbering)
            .field("spi", &self.spi)
            .field("started", &self.started)
            .finish()
    }
}
