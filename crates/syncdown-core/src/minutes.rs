//! Configured-duration coercion
//!
//! Reconfigure input is never rejected: anything that is not a usable
//! number of minutes collapses onto the one-minute floor.

/// Default configured duration for a fresh timer session
pub const DEFAULT_CONFIGURED_MINUTES: u32 = 5;

/// Smallest configurable duration
pub const MIN_CONFIGURED_MINUTES: u32 = 1;

/// Largest configurable duration, matching the controller's input range
pub const MAX_CONFIGURED_MINUTES: u32 = 999;

/// Coerce an optional minute count into the configurable range.
///
/// Absent, zero, and negative inputs become one minute; values above the
/// ceiling are clamped to it.
pub fn coerce_minutes(input: Option<i64>) -> u32 {
    match input {
        Some(m) if m >= MIN_CONFIGURED_MINUTES as i64 => {
            m.min(MAX_CONFIGURED_MINUTES as i64) as u32
        }
        _ => MIN_CONFIGURED_MINUTES,
    }
}

/// Parse free-form minute input like a numeric form field would.
///
/// Leading whitespace and an optional sign are accepted, then the leading
/// run of digits is taken and the rest ignored (`"12abc"` is 12). Text with
/// no leading digits is treated as absent.
pub fn parse_minutes(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    // Overlong digit runs saturate rather than fail; the result is clamped anyway.
    let value = rest[..digits_end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Total seconds of a configured duration
#[inline]
pub fn minutes_to_secs(minutes: u32) -> i64 {
    minutes as i64 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_minutes() {
        assert_eq!(coerce_minutes(None), 1);
        assert_eq!(coerce_minutes(Some(0)), 1);
        assert_eq!(coerce_minutes(Some(-7)), 1);
        assert_eq!(coerce_minutes(Some(10)), 10);
        assert_eq!(coerce_minutes(Some(5_000)), MAX_CONFIGURED_MINUTES);
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("15"), Some(15));
        assert_eq!(parse_minutes("  12abc"), Some(12));
        assert_eq!(parse_minutes("-3"), Some(-3));
        assert_eq!(parse_minutes("+4"), Some(4));
        assert_eq!(parse_minutes("abc"), None);
        assert_eq!(parse_minutes(""), None);
        assert_eq!(parse_minutes("-"), None);
        assert_eq!(parse_minutes("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_parse_then_coerce() {
        assert_eq!(coerce_minutes(parse_minutes("nope")), 1);
        assert_eq!(coerce_minutes(parse_minutes("0")), 1);
        assert_eq!(coerce_minutes(parse_minutes("25 minutes")), 25);
    }
}
