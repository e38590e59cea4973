use std::fmt;

/// Fixed-point decimal with 2 decimal places, stored as a scaled integer.
///
/// Used for currency amounts, point balances (1 point is pegged to 1
/// currency unit), and litre quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_whole(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Divide by a plain integer, rounding half away from zero to the
    /// nearest 2-decimal value.
    pub fn div_round(self, divisor: i64) -> Amount {
        let half = divisor / 2;
        if self.0 >= 0 {
            Amount((self.0 + half) / divisor)
        } else {
            Amount((self.0 - half) / divisor)
        }
    }

    /// How many whole multiples of `unit` fit in this amount (floor).
    pub fn whole_per(self, unit: i64) -> i64 {
        (self.0 / Self::SCALE) / unit
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

/// Fixed-point multiply (litres x price-per-litre), rounded to the
/// nearest 2-decimal value.
impl std::ops::Mul for Amount {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let product = self.0 * rhs.0;
        let half = Self::SCALE / 2;
        if product >= 0 {
            Amount((product + half) / Self::SCALE)
        } else {
            Amount((product - half) / Self::SCALE)
        }
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scaled_preserves_value() {
        let amount = Amount::from_scaled(12345);
        assert_eq!(amount, Amount(12345));
    }

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(100.0), Amount::from_scaled(10_000));
        assert_eq!(Amount::from_float(1.5), Amount::from_scaled(150));
        assert_eq!(Amount::from_float(0.01), Amount::from_scaled(1));
    }

    #[test]
    fn from_float_rounds_correctly() {
        assert_eq!(Amount::from_float(1.234), Amount::from_scaled(123));
        assert_eq!(Amount::from_float(1.235), Amount::from_scaled(124));
    }

    #[test]
    fn from_whole_scales() {
        assert_eq!(Amount::from_whole(500), Amount::from_scaled(50_000));
    }

    #[test]
    fn display_formats_positive() {
        assert_eq!(Amount::from_scaled(10_000).to_string(), "100.00");
        assert_eq!(Amount::from_scaled(150).to_string(), "1.50");
        assert_eq!(Amount::from_scaled(1).to_string(), "0.01");
        assert_eq!(Amount::from_scaled(0).to_string(), "0.00");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_scaled(-5025).to_string(), "-50.25");
        assert_eq!(Amount::from_scaled(-1).to_string(), "-0.01");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }

    #[test]
    fn add_and_sub() {
        let a = Amount::from_whole(100);
        let b = Amount::from_whole(30);
        assert_eq!(a + b, Amount::from_whole(130));
        assert_eq!(a - b, Amount::from_whole(70));
    }

    #[test]
    fn assign_ops() {
        let mut a = Amount::from_whole(100);
        a += Amount::from_whole(50);
        assert_eq!(a, Amount::from_whole(150));
        a -= Amount::from_whole(30);
        assert_eq!(a, Amount::from_whole(120));
    }

    #[test]
    fn mul_scales_product() {
        // 10.5 litres at 102.86 per litre
        let total = Amount::from_float(10.5) * Amount::from_float(102.86);
        assert_eq!(total, Amount::from_float(1080.03));
    }

    #[test]
    fn div_round_to_nearest_cent() {
        // 800.00 / 50 = 16.00 exactly
        assert_eq!(Amount::from_whole(800).div_round(50), Amount::from_whole(16));
        // 801.00 / 50 = 16.02
        assert_eq!(
            Amount::from_whole(801).div_round(50),
            Amount::from_scaled(1602)
        );
    }

    #[test]
    fn whole_per_floors() {
        assert_eq!(Amount::from_whole(950).whole_per(100), 9);
        assert_eq!(Amount::from_float(999.99).whole_per(100), 9);
        assert_eq!(Amount::from_whole(1000).whole_per(100), 10);
        assert_eq!(Amount::from_whole(99).whole_per(100), 0);
    }

    #[test]
    fn ordering() {
        let small = Amount::from_whole(1);
        let large = Amount::from_whole(2);
        assert!(small < large);
        assert_eq!(small.max(Amount::ZERO), small);
        assert_eq!(Amount::from_whole(-1).max(Amount::ZERO), Amount::ZERO);
    }
}
