//! Fixed point integers with ISO prefixes.
//!
//! Metrics are stored as `i64` scaled by `10^fraction`. Text uses the
//! prefixes `k M G T P E`, scaled by 1000 or, for binary metrics, by 1024.

use crate::Layer2Error;

const PREFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];

/// Fraction digits shown when a prefix is used
const PREFIXED_DIGITS: usize = 3;

fn pow10(exp: u32) -> i128 {
    10i128.pow(exp)
}

fn base(binary: bool) -> i128 {
    if binary {
        1024
    } else {
        1000
    }
}

/// Print `int.frac` with `digits` fraction digits, trailing zeros removed
fn decimal(int: i128, frac: i128, digits: usize) -> String {
    if digits == 0 || frac == 0 {
        return int.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits);
    format!("{}.{}", int, frac.trim_end_matches('0'))
}

/// Render a stored value with prefix and unit.
///
/// `raw` disables prefixes and prints the exact fixed point value.
pub fn format_value(value: i64, unit: &str, fraction: u8, binary: bool, raw: bool) -> String {
    let scale = pow10(fraction as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = (value as i128).abs();

    let mut multiplier = 1i128;
    let mut prefix = 0;
    if !raw {
        while prefix + 1 < PREFIXES.len() && abs >= multiplier * base(binary) * scale {
            multiplier *= base(binary);
            prefix += 1;
        }
    }

    let number = if prefix == 0 {
        decimal(abs / scale, abs % scale, fraction as usize)
    } else {
        let shown = abs * pow10(PREFIXED_DIGITS as u32) / (multiplier * scale);
        let digits = pow10(PREFIXED_DIGITS as u32);
        decimal(shown / digits, shown % digits, PREFIXED_DIGITS)
    };

    format!("{}{}{}{}", sign, number, PREFIXES[prefix], unit)
}

/// Parse text like `54M`, `-52.5` or `1.5k` into a stored value
pub fn parse_value(input: &str, fraction: u8, binary: bool) -> Result<i64, Layer2Error> {
    let invalid = |reason| Layer2Error::InvalidNumber {
        input: input.to_string(),
        reason,
    };

    let text = input.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let number_end = text
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(number_end);

    let prefix = PREFIXES
        .iter()
        .position(|p| *p == suffix)
        .ok_or_else(|| invalid("unknown prefix"))?;

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("no digits"));
    }
    if frac_part.contains('.') {
        return Err(invalid("more than one decimal point"));
    }
    if frac_part.len() > 18 {
        return Err(invalid("too many fraction digits"));
    }

    let mut mantissa: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = c.to_digit(10).ok_or_else(|| invalid("not a number"))? as i128;
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(digit))
            .ok_or_else(|| invalid("out of range"))?;
    }

    let multiplier = base(binary).pow(prefix as u32) * pow10(fraction as u32);
    let scaled = mantissa
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("out of range"))?
        / pow10(frac_part.len() as u32);
    let scaled = if negative { -scaled } else { scaled };

    i64::try_from(scaled).map_err(|_| invalid("out of range"))
}

/// Parse a boolean the way configuration files spell it
pub fn parse_bool(input: &str) -> Result<bool, Layer2Error> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Layer2Error::InvalidNumber {
            input: input.to_string(),
            reason: "not a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prefixes() {
        assert_eq!(format_value(54_000_000, "bit/s", 0, false, false), "54Mbit/s");
        assert_eq!(format_value(54 * 1024 * 1024, "bit/s", 0, true, false), "54Mbit/s");
        assert_eq!(format_value(1_500, "byte", 0, false, false), "1.5kbyte");
        assert_eq!(format_value(999, "", 0, false, false), "999");
        assert_eq!(format_value(0, "Hz", 0, false, false), "0Hz");
    }

    #[test]
    fn test_format_fraction() {
        assert_eq!(format_value(-52_500, "dBm", 3, false, false), "-52.5dBm");
        assert_eq!(format_value(500, "s", 6, false, false), "0.0005s");
        assert_eq!(format_value(2_412_000_000, "Hz", 0, false, false), "2.412GHz");
    }

    #[test]
    fn test_format_raw() {
        assert_eq!(format_value(54_000_000, "bit/s", 0, false, true), "54000000bit/s");
        assert_eq!(format_value(-52_500, "", 3, false, true), "-52.5");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_value("54M", 0, false).unwrap(), 54_000_000);
        assert_eq!(parse_value("54M", 0, true).unwrap(), 54 * 1024 * 1024);
        assert_eq!(parse_value("-52.5", 3, false).unwrap(), -52_500);
        assert_eq!(parse_value("1.5k", 0, true).unwrap(), 1_536);
        assert_eq!(parse_value("0.0005", 6, false).unwrap(), 500);
        assert_eq!(parse_value(" 1500 ", 0, false).unwrap(), 1_500);
        // precision beyond the fraction digits is truncated
        assert_eq!(parse_value("1.2345", 3, false).unwrap(), 1_234);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_value("", 0, false).is_err());
        assert!(parse_value("abc", 0, false).is_err());
        assert!(parse_value("1.2.3", 0, false).is_err());
        assert!(parse_value("5X", 0, false).is_err());
        assert!(parse_value("10E", 0, false).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("Off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
