//! Referral codes and the one-time signup bonus.

use rand::Rng;

use crate::Amount;

/// Points credited to the referrer when a referred signup completes.
pub fn referral_bonus() -> Amount {
    Amount::from_whole(500)
}

/// Generate a referral code: `FUEL-` plus 6 uppercase alphanumerics.
/// Uniqueness is enforced by the ledger when the code is reserved.
pub fn generate_referral_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("FUEL-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_expected_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 11);
        assert!(code.starts_with("FUEL-"));
        assert!(
            code[5..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn bonus_is_five_hundred_points() {
        assert_eq!(referral_bonus(), Amount::from_whole(500));
    }
}
