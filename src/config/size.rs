//! Size suffix parser for `-s`/`-b`/`-m`/`-D` (spec §6 "Size parsing").

use crate::constants::{MAX_MEMORY_PERCENT, MIN_EXPLICIT_BYTES};
use crate::error::{FlowbufError, Result};

/// Result of parsing a size argument: either a concrete byte count or a
/// percentage of physical memory to be resolved later against
/// [`crate::config::physical_memory_bytes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedSize {
    Bytes(u64),
    Percent(f64),
}

/// Parse `<number>[k|K|M|G|T|b|B|%]`.
pub fn parse_size(raw: &str) -> Result<ParsedSize> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FlowbufError::config("empty size argument"));
    }

    let (digits, suffix) = split_suffix(raw);
    if digits.is_empty() {
        return Err(FlowbufError::config(format!("size '{raw}' has no numeric part")));
    }
    let value: f64 = digits
        .parse()
        .map_err(|_| FlowbufError::config(format!("size '{raw}' is not a number")))?;
    if value < 0.0 {
        return Err(FlowbufError::config(format!("size '{raw}' must not be negative")));
    }

    let bytes_per_unit: u64 = match suffix {
        "" | "b" | "B" => {
            let bytes = value as u64;
            if bytes < MIN_EXPLICIT_BYTES {
                return Err(FlowbufError::config(format!(
                    "explicit byte size {bytes} is below the minimum of {MIN_EXPLICIT_BYTES}"
                )));
            }
            return Ok(ParsedSize::Bytes(bytes));
        }
        "k" | "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        "T" => 1024u64.pow(4),
        "%" => {
            if value > MAX_MEMORY_PERCENT {
                return Err(FlowbufError::config(format!(
                    "percent size {value} exceeds the {MAX_MEMORY_PERCENT} cap"
                )));
            }
            return Ok(ParsedSize::Percent(value));
        }
        other => return Err(FlowbufError::config(format!("unknown size suffix '{other}'"))),
    };

    Ok(ParsedSize::Bytes((value * bytes_per_unit as f64) as u64))
}

fn split_suffix(raw: &str) -> (&str, &str) {
    let split_at = raw
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    raw.split_at(split_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes_rejects_small_values() {
        assert!(parse_size("127b").is_err());
        assert!(matches!(parse_size("128b"), Ok(ParsedSize::Bytes(128))));
    }

    #[test]
    fn suffix_multipliers() {
        assert!(matches!(parse_size("4k"), Ok(ParsedSize::Bytes(4096))));
        assert!(matches!(parse_size("1M"), Ok(ParsedSize::Bytes(n)) if n == 1024 * 1024));
        assert!(matches!(parse_size("2G"), Ok(ParsedSize::Bytes(n)) if n == 2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn percent_bounded() {
        assert!(matches!(parse_size("50%"), Ok(ParsedSize::Percent(p)) if p == 50.0));
        assert!(parse_size("91%").is_err());
        assert!(matches!(parse_size("90%"), Ok(ParsedSize::Percent(_))));
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("4Q").is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn k_suffix_is_always_1024_times_the_plain_value(n in 128u64..1_000_000) {
                let plain = parse_size(&format!("{n}b")).unwrap();
                let suffixed = parse_size(&format!("{n}k")).unwrap();
                match (plain, suffixed) {
                    (ParsedSize::Bytes(p), ParsedSize::Bytes(s)) => prop_assert_eq!(s, p * 1024),
                    other => panic!("unexpected parse result: {other:?}"),
                }
            }

            #[test]
            fn percent_within_cap_always_parses(p in 0.0f64..=90.0) {
                let s = format!("{}%", p);
                prop_assert!(matches!(parse_size(&s), Ok(ParsedSize::Percent(_))));
            }
        }
    }
}
