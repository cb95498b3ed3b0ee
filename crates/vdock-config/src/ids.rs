//! Parsing for the 16-bit vendor and product ids of the virtual device.
//!
//! Ids follow the C `strtoul` prefix conventions: `0x`/`0X` selects hex, a
//! leading `0` selects octal, anything else is decimal. Unlike `strtoul`,
//! trailing garbage and out-of-range values are rejected instead of being
//! truncated or silently turned into zero.

use crate::ConfigError;

/// Parse a device id written in decimal, octal (`017`) or hex (`0x1337`).
pub fn parse_id(value: &str) -> Result<u16, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidId {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty value"));
    }

    let (digits, radix) = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        (hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };

    if digits.is_empty() {
        return Err(invalid("missing digits after prefix"));
    }
    // from_str_radix would also accept a leading sign
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid(match radix {
            16 => "not a hexadecimal number",
            8 => "not an octal number",
            _ => "not a decimal number",
        }));
    }

    let parsed = u32::from_str_radix(digits, radix)
        .map_err(|_| invalid("value out of range for a 16-bit id"))?;
    u16::try_from(parsed).map_err(|_| invalid("value out of range for a 16-bit id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_id("4919").unwrap(), 0x1337);
        assert_eq!(parse_id("0").unwrap(), 0);
        assert_eq!(parse_id("65535").unwrap(), u16::MAX);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_id("0x1337").unwrap(), 0x1337);
        assert_eq!(parse_id("0XBEEF").unwrap(), 0xbeef);
        assert_eq!(parse_id("0xffff").unwrap(), u16::MAX);
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_id("017").unwrap(), 15);
        assert_eq!(parse_id("0777").unwrap(), 511);
    }

    #[test]
    fn test_rejects_garbage() {
        for bad in ["", "  ", "abc", "12ab", "0x", "0xg1", "08", "-1", "+5", "1.5"] {
            assert!(
                matches!(parse_id(bad), Err(ConfigError::InvalidId { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(parse_id("65536").is_err());
        assert!(parse_id("0x10000").is_err());
        assert!(parse_id("99999999999999").is_err());
    }

    #[test]
    fn test_error_names_the_value() {
        let err = parse_id("0xzz").unwrap_err();
        assert!(err.to_string().contains("0xzz"));
    }
}
