//! Clock-face formatting

/// Render signed seconds as `[-]MM:SS`.
///
/// The minutes field is at least two digits and grows without bound, so an
/// hour and a bit reads `61:01`. Overtime carries a leading `-`.
pub fn format_clock(seconds: i64) -> String {
    let magnitude = seconds.unsigned_abs();
    let sign = if seconds < 0 { "-" } else { "" };
    format!("{}{:02}:{:02}", sign, magnitude / 60, magnitude % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_clock_examples() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(-1), "-00:01");
        assert_eq!(format_clock(599), "09:59");
        assert_eq!(format_clock(3600), "60:00");
        assert_eq!(format_clock(-65), "-01:05");
        assert_eq!(format_clock(3661), "61:01");
    }

    #[test]
    fn test_format_clock_extremes() {
        assert_eq!(format_clock(i64::MIN).chars().next(), Some('-'));
        assert!(format_clock(i64::MAX).ends_with(":07"));
    }

    proptest! {
        #[test]
        fn test_format_clock_parses_back(seconds in -10_000_000i64..10_000_000) {
            let text = format_clock(seconds);
            let (negative, body) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text.as_str()),
            };
            let (mins, secs) = body.split_once(':').unwrap();
            prop_assert_eq!(secs.len(), 2);
            prop_assert!(mins.len() >= 2);
            let total = mins.parse::<i64>().unwrap() * 60 + secs.parse::<i64>().unwrap();
            prop_assert_eq!(if negative { -total } else { total }, seconds);
            prop_assert_eq!(negative, seconds < 0);
        }
    }
}
