//! 40-pin header to BCM GPIO mapping
//!
//! Positions 1-26 are the original Model B header. Positions 27-40 are the
//! B+ extension. Positions missing from the table are power, ground or the
//! ID EEPROM bus and carry no usable GPIO.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::gpio::Pin;

/// Number of positions on the header
pub const HEADER_PINS: u8 = 40;

/// Physical position -> BCM GPIO line
pub static PHYSICAL_TO_BCM: Lazy<HashMap<u8, Pin>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(3, 0);
    m.insert(5, 1);
    m.insert(7, 4);
    m.insert(8, 14);
    m.insert(10, 15);
    m.insert(11, 17);
    m.insert(12, 18);
    m.insert(13, 27);
    m.insert(15, 22);
    m.insert(16, 23);
    m.insert(18, 24);
    m.insert(19, 10);
    m.insert(21, 9);
    m.insert(22, 25);
    m.insert(23, 11);
    m.insert(24, 8);
    m.insert(26, 7);
    // Model B+ pins
    m.insert(29, 5);
    m.insert(31, 6);
    m.insert(32, 12);
    m.insert(33, 13);
    m.insert(35, 19);
    m.insert(36, 16);
    m.insert(37, 26);
    m.insert(38, 20);
    m.insert(40, 21);
    m
});

/// BCM line wired to a header position
pub fn bcm_for_physical(physical: u8) -> Result<Pin> {
    PHYSICAL_TO_BCM
        .get(&physical)
        .copied()
        .ok_or(Error::InvalidPin(physical))
}

/// What sits on a header position that has no GPIO
pub fn describe_physical(physical: u8) -> &'static str {
    match physical {
        1 | 17 => "3V3",
        2 | 4 => "5V",
        6 | 9 | 14 | 20 | 25 | 30 | 34 | 39 => "GND",
        27 => "ID_SD",
        28 => "ID_SC",
        p if PHYSICAL_TO_BCM.contains_key(&p) => "GPIO",
        _ => "-",
    }
}

/// Every header position with its BCM line, if any
pub fn header_pins() -> Vec<(u8, Option<Pin>)> {
    (1..=HEADER_PINS)
        .map(|p| (p, PHYSICAL_TO_BCM.get(&p).copied()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spi0_pins() {
        assert_eq!(bcm_for_physical(19).unwrap(), 10);
        assert_eq!(bcm_for_physical(21).unwrap(), 9);
        assert_eq!(bcm_for_physical(23).unwrap(), 11);
        assert_eq!(bcm_for_physical(24).unwrap(), 8);
        assert_eq!(bcm_for_physical(26).unwrap(), 7);
    }

    #[test]
    fn test_gpio0_is_a_valid_target() {
        assert_eq!(bcm_for_physical(3).unwrap(), 0);
    }

    #[test]
    fn test_power_and_ground_rejected() {
        for p in [0, 1, 2, 6, 27, 28, 39, 41] {
            assert!(matches!(bcm_for_physical(p), Err(Error::InvalidPin(x)) if x == p));
        }
    }

    #[test]
    fn test_header_table() {
        let pins = header_pins();
        assert_eq!(pins.len(), 40);
        assert_eq!(pins.iter().filter(|(_, bcm)| bcm.is_some()).count(), 26);
        assert_eq!(describe_physical(39), "GND");
        assert_eq!(describe_physical(40), "GPIO");
    }
}
