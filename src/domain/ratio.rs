pub const DEFAULT_MIN: i32 = 0;
pub const DEFAULT_MAX: i32 = 5;

/// Partial-credit ratio in `[0, 1]` for a `(value, max)` rubric pair.
///
/// A missing or zero `max` falls back to `default_max`, and the effective max
/// never drops below 1. A missing `value` counts as `default_min`; the value
/// is clamped into `[default_min, max]` before dividing.
pub fn calculate_ratio(value: Option<i32>, max: Option<i32>, default_min: i32, default_max: i32) -> f64 {
    let max = match max {
        Some(m) if m != 0 => m,
        _ => default_max,
    }
    .max(1) as f64;
    let value = (value.unwrap_or(default_min) as f64).max(default_min as f64).min(max);
    value / max
}

pub fn ratio(value: i32, max: i32) -> f64 {
    calculate_ratio(Some(value), Some(max), DEFAULT_MIN, DEFAULT_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_bounds() {
        for value in -10..=20 {
            for max in -3..=12 {
                let r = ratio(value, max);
                assert!((0.0..=1.0).contains(&r), "ratio({value}, {max}) = {r}");
            }
        }
    }

    #[test]
    fn test_zero_max_uses_default_ceiling() {
        assert_eq!(ratio(5, 0), 1.0);
        assert_eq!(ratio(2, 0), 0.4);
        assert_eq!(calculate_ratio(Some(3), None, 0, 10), 0.3);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(ratio(-5, 5), 0.0);
        assert_eq!(ratio(100, 5), 1.0);
        assert_eq!(ratio(3, 5), 0.6);
    }

    #[test]
    fn test_missing_value_counts_as_minimum() {
        assert_eq!(calculate_ratio(None, Some(5), 0, 5), 0.0);
        assert_eq!(calculate_ratio(None, Some(4), 1, 5), 0.25);
    }

    #[test]
    fn test_negative_max_floors_at_one() {
        assert_eq!(ratio(1, -4), 1.0);
        assert_eq!(ratio(0, -4), 0.0);
    }
}
