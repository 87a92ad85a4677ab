//! Platform capability detection
//!
//! Decides once, when a context is built, whether the BCM register driver or
//! the no-op driver backs it. Detection reads the device tree the same way
//! libbcm2835 does.

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::config::PlatformChoice;
use crate::driver::{NoopDriver, PeripheralDriver};

/// BCM2835 (Pi 1, Zero) peripheral base
pub const BCM2835_PERI_BASE: u64 = 0x2000_0000;
/// BCM2836/BCM2837 (Pi 2, Pi 3) peripheral base
pub const BCM2837_PERI_BASE: u64 = 0x3F00_0000;
/// BCM2711 (Pi 4) peripheral base
pub const BCM2711_PERI_BASE: u64 = 0xFE00_0000;

const DT_RANGES: &str = "/proc/device-tree/soc/ranges";

/// Result of capability detection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// A BCM SoC with memory-mappable peripherals
    Bcm { peripheral_base: u64 },
    /// No supported GPIO hardware
    Unsupported,
}

impl Platform {
    /// Driver backing this platform
    pub fn driver(&self, memory_device: impl AsRef<Path>) -> Box<dyn PeripheralDriver + Send> {
        match *self {
            #[cfg(unix)]
            Platform::Bcm { peripheral_base } => Box::new(crate::driver::Bcm2835Driver::new(
                peripheral_base,
                memory_device,
            )),
            #[cfg(not(unix))]
            Platform::Bcm { .. } => {
                let _ = memory_device;
                warn!("register mapping is unix-only, falling back to no-op driver");
                Box::new(NoopDriver)
            }
            Platform::Unsupported => Box::new(NoopDriver),
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Platform::Bcm { .. })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Bcm { peripheral_base } => {
                write!(f, "BCM peripherals at {:#010x}", peripheral_base)
            }
            Platform::Unsupported => write!(f, "no GPIO hardware"),
        }
    }
}

/// Peripheral base from the `soc/ranges` property
///
/// The child bus address is followed by the parent (ARM physical) address.
/// On BCM2711 the parent address has two cells and the first one is zero.
pub fn parse_ranges(ranges: &[u8]) -> Option<u64> {
    let cell = |offset: usize| -> Option<u64> {
        let bytes: [u8; 4] = ranges.get(offset..offset + 4)?.try_into().ok()?;
        Some(u64::from(u32::from_be_bytes(bytes)))
    };

    match cell(4)? {
        0 => cell(8).filter(|base| *base != 0),
        base => Some(base),
    }
}

/// Detect from a `soc/ranges` file at an arbitrary path
///
/// A readable ranges property selects the register driver at the base it
/// names. Anything else selects the no-op driver.
pub fn detect_in(ranges: &Path) -> Platform {
    let content = match fs::read(ranges) {
        Ok(content) => content,
        Err(e) => {
            debug!("cannot read {}: {}", ranges.display(), e);
            return Platform::Unsupported;
        }
    };
    match parse_ranges(&content) {
        Some(peripheral_base) => Platform::Bcm { peripheral_base },
        None => {
            warn!("{} holds no peripheral base", ranges.display());
            Platform::Unsupported
        }
    }
}

/// Detect the running platform
pub fn detect() -> Platform {
    detect_in(Path::new(DT_RANGES))
}

/// Apply a configured override on top of detection
///
/// A forced `hardware` choice with no readable device tree and no override
/// falls back to the BCM2835 base.
pub fn select(choice: PlatformChoice, base_override: Option<u64>) -> Platform {
    match choice {
        PlatformChoice::None => Platform::Unsupported,
        PlatformChoice::Auto => match (detect(), base_override) {
            (Platform::Bcm { .. }, Some(base)) => Platform::Bcm {
                peripheral_base: base,
            },
            (detected, _) => detected,
        },
        PlatformChoice::Hardware => {
            let peripheral_base = base_override
                .or(match detect() {
                    Platform::Bcm { peripheral_base } => Some(peripheral_base),
                    Platform::Unsupported => None,
                })
                .unwrap_or(BCM2835_PERI_BASE);
            Platform::Bcm { peripheral_base }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_ranges_pi3() {
        let ranges = [
            0x7e, 0x00, 0x00, 0x00, 0x3f, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        ];
        assert_eq!(parse_ranges(&ranges), Some(BCM2837_PERI_BASE));
    }

    #[test]
    fn test_parse_ranges_pi4() {
        let ranges = [
            0x7e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xfe, 0x00, 0x00, 0x00, 0x01, 0x80,
            0x00, 0x00,
        ];
        assert_eq!(parse_ranges(&ranges), Some(BCM2711_PERI_BASE));
    }

    #[test]
    fn test_parse_ranges_truncated() {
        assert_eq!(parse_ranges(&[0x7e, 0x00]), None);
        assert_eq!(parse_ranges(&[0; 8]), None);
    }

    #[test]
    fn test_detect_without_device_tree() {
        let dir = tempdir().unwrap();
        let platform = detect_in(&dir.path().join("ranges"));
        assert_eq!(platform, Platform::Unsupported);
        assert!(!platform.driver("/dev/null").is_hardware());
    }

    #[test]
    fn test_detect_pi3_ranges() {
        let dir = tempdir().unwrap();
        let ranges = dir.path().join("ranges");
        std::fs::write(&ranges, [0x7e, 0, 0, 0, 0x3f, 0, 0, 0, 0x01, 0, 0, 0]).unwrap();

        assert_eq!(
            detect_in(&ranges),
            Platform::Bcm {
                peripheral_base: BCM2837_PERI_BASE
            }
        );
    }

    #[test]
    fn test_detect_pi4_ranges() {
        let dir = tempdir().unwrap();
        let ranges = dir.path().join("ranges");
        std::fs::write(
            &ranges,
            [0x7e, 0, 0, 0, 0, 0, 0, 0, 0xfe, 0, 0, 0, 0x01, 0x80, 0, 0],
        )
        .unwrap();

        assert_eq!(
            detect_in(&ranges),
            Platform::Bcm {
                peripheral_base: BCM2711_PERI_BASE
            }
        );
    }

    #[test]
    fn test_detect_unparseable_ranges() {
        let dir = tempdir().unwrap();
        let ranges = dir.path().join("ranges");
        std::fs::write(&ranges, [0x7e, 0x00]).unwrap();
        assert_eq!(detect_in(&ranges), Platform::Unsupported);
    }

    #[test]
    fn test_select_none_overrides_detection() {
        assert_eq!(
            select(PlatformChoice::None, Some(BCM2711_PERI_BASE)),
            Platform::Unsupported
        );
    }

    #[test]
    fn test_select_hardware_with_override() {
        assert_eq!(
            select(PlatformChoice::Hardware, Some(BCM2711_PERI_BASE)),
            Platform::Bcm {
                peripheral_base: BCM2711_PERI_BASE
            }
        );
    }
}
