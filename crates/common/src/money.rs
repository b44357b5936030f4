//! Monetary rounding helpers.
//!
//! All intermediate arithmetic stays at full f64 precision; rounding to two
//! decimal places happens only where a value crosses an exposure boundary
//! (API response, locked price, alert comparison display). Rounding
//! mid-calculation would compound drift across batch calculations.

/// Round a monetary amount to 2 decimal places.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_basic() {
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(-2.346), -2.35);
    }

    #[test]
    fn test_round2_no_accumulated_drift() {
        // Rounding the same value repeatedly is a fixed point.
        let v = round2(68_202.2 * 0.03);
        assert_eq!(v, 2_046.07);
        assert_eq!(round2(v), v);
        assert_eq!(round2(round2(v)), v);
    }

    #[test]
    fn test_round2_large_values() {
        assert_eq!(round2(70_248.266), 70_248.27);
        assert_eq!(round2(70_248.264), 70_248.26);
    }
}
