//! Argument parsers for byte strings and auxiliary pin lists

use anyhow::{anyhow, bail, Result};
use rpio::{AuxPin, Level, Pin};

/// Parse hex bytes. Accepts an optional `0x` prefix and `:`, `,`, `_` or
/// whitespace between bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = body
        .chars()
        .filter(|c| !matches!(c, ':' | ',' | '_') && !c.is_whitespace())
        .collect();

    if !digits.is_ascii() {
        bail!("hex string contains non-hex characters: {}", input);
    }
    if digits.len() % 2 != 0 {
        bail!("hex string has an odd number of digits: {}", input);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| anyhow!("invalid hex byte '{}' in {}", &digits[i..i + 2], input))
        })
        .collect()
}

/// Format bytes as space-separated hex
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse `PIN=LEVEL`, e.g. `5=1`
pub fn parse_aux(input: &str) -> Result<AuxPin> {
    let (pin, level) = input
        .split_once('=')
        .ok_or_else(|| anyhow!("auxiliary pin must look like PIN=LEVEL, got {}", input))?;
    let pin: Pin = pin
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid pin number: {}", pin))?;
    Ok(AuxPin::new(pin, parse_level(level)?))
}

/// Parse a level: `0`/`1`, `low`/`high`
pub fn parse_level(input: &str) -> Result<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "0" | "low" => Ok(Level::Low),
        "1" | "high" => Ok(Level::High),
        other => bail!("invalid level: {} (use 0, 1, low or high)", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("010203").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_hex("0x9f 00:00").unwrap(), vec![0x9f, 0, 0]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x01, 0xab]), "01 ab");
    }

    #[test]
    fn test_parse_aux() {
        assert_eq!(parse_aux("5=1").unwrap(), AuxPin::new(5, Level::High));
        assert_eq!(parse_aux("6=low").unwrap(), AuxPin::new(6, Level::Low));
        assert!(parse_aux("5").is_err());
        assert!(parse_aux("x=1").is_err());
        assert!(parse_aux("5=2").is_err());
    }
}
