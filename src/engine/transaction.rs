//! At-the-pump transaction records.
//!
//! A transaction is a point-earning fuel event recorded by an operator,
//! independent of the prepaid order flow. Referral bonuses are logged
//! here too, as zero-amount audit entries.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::Amount;
use crate::model::{AccountId, FuelType, PaymentMethod, RedemptionId, TransactionId};

/// Gross cash per point earned at the pump. Applies to the full amount
/// before any redemption cashback; a different economy from the prepaid
/// order rate on purpose.
pub const GROSS_PER_POINT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Fuel,
    Referral,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Fuel => "fuel",
            TransactionKind::Referral => "referral",
        };
        f.write_str(name)
    }
}

/// Operator input for recording a pump sale.
#[derive(Debug, Clone)]
pub struct PumpSale {
    pub account: AccountId,
    pub fuel_type: FuelType,
    pub liters: Amount,
    pub payment_method: PaymentMethod,
    pub pump_operator: Option<String>,
    pub double_points: bool,
    pub redemption: Option<RedemptionId>,
    pub notes: Option<String>,
}

/// A recorded point-earning event.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub receipt_number: String,
    pub account: AccountId,
    pub kind: TransactionKind,
    pub fuel_type: Option<FuelType>,
    pub liters: Option<Amount>,
    pub price_per_liter: Option<Amount>,
    pub total_amount: Amount,
    /// Computed once at creation, never recomputed.
    pub points_earned: Amount,
    pub is_double_points: bool,
    pub redemption_applied: bool,
    pub redemption: Option<RedemptionId>,
    pub cashback_amount: Amount,
    pub final_amount: Amount,
    pub payment_method: PaymentMethod,
    pub pump_operator: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Points for a pump sale: whole points per 100 gross, doubled on promo.
pub fn points_for(total_amount: Amount, double_points: bool) -> Amount {
    let points = total_amount.whole_per(GROSS_PER_POINT);
    Amount::from_whole(if double_points { points * 2 } else { points })
}

impl Transaction {
    /// Build a fuel transaction. `redemption` carries the consumed
    /// credit's id and cashback amount when one was applied.
    pub fn fuel(
        receipt_number: String,
        sale: &PumpSale,
        price_per_liter: Amount,
        redemption: Option<(RedemptionId, Amount)>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_amount = sale.liters * price_per_liter;
        let (redemption_id, cashback_amount) = match redemption {
            Some((id, cashback)) => (Some(id), cashback),
            None => (None, Amount::ZERO),
        };
        Self {
            id: Uuid::new_v4(),
            receipt_number,
            account: sale.account,
            kind: TransactionKind::Fuel,
            fuel_type: Some(sale.fuel_type),
            liters: Some(sale.liters),
            price_per_liter: Some(price_per_liter),
            total_amount,
            points_earned: points_for(total_amount, sale.double_points),
            is_double_points: sale.double_points,
            redemption_applied: redemption_id.is_some(),
            redemption: redemption_id,
            cashback_amount,
            final_amount: (total_amount - cashback_amount).max(Amount::ZERO),
            payment_method: sale.payment_method,
            pump_operator: sale.pump_operator.clone(),
            description: sale.notes.clone(),
            created_at: now,
        }
    }

    /// Zero-amount audit entry for a referral bonus.
    pub fn referral(
        receipt_number: String,
        account: AccountId,
        points: Amount,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            receipt_number,
            account,
            kind: TransactionKind::Referral,
            fuel_type: None,
            liters: None,
            price_per_liter: None,
            total_amount: Amount::ZERO,
            points_earned: points,
            is_double_points: false,
            redemption_applied: false,
            redemption: None,
            cashback_amount: Amount::ZERO,
            final_amount: Amount::ZERO,
            payment_method: PaymentMethod::System,
            pump_operator: None,
            description: Some(description),
            created_at: now,
        }
    }
}

/// Generate a receipt number: `FS` + year + zero-padded month + 4 random
/// digits. The engine re-rolls on the rare collision.
pub fn generate_receipt_number(now: DateTime<Utc>) -> String {
    let random: u32 = rand::thread_rng().gen_range(1000..10_000);
    format!("FS{}{:02}{}", now.year(), now.month(), random)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(liters: f64, double_points: bool) -> PumpSale {
        PumpSale {
            account: Uuid::new_v4(),
            fuel_type: FuelType::Petrol,
            liters: Amount::from_float(liters),
            payment_method: PaymentMethod::Cash,
            pump_operator: Some("ravi".to_string()),
            double_points,
            redemption: None,
            notes: None,
        }
    }

    #[test]
    fn points_floor_per_hundred_gross() {
        assert_eq!(points_for(Amount::from_whole(950), false), Amount::from_whole(9));
        assert_eq!(points_for(Amount::from_whole(950), true), Amount::from_whole(18));
        assert_eq!(points_for(Amount::from_whole(99), false), Amount::ZERO);
    }

    #[test]
    fn fuel_transaction_computes_totals() {
        // 9.5 litres at 100.00
        let tx = Transaction::fuel(
            "FS2025081234".to_string(),
            &sale(9.5, false),
            Amount::from_whole(100),
            None,
            Utc::now(),
        );

        assert_eq!(tx.kind, TransactionKind::Fuel);
        assert_eq!(tx.total_amount, Amount::from_whole(950));
        assert_eq!(tx.points_earned, Amount::from_whole(9));
        assert_eq!(tx.final_amount, Amount::from_whole(950));
        assert!(!tx.redemption_applied);
    }

    #[test]
    fn cashback_reduces_final_but_not_points() {
        let redemption = (Uuid::new_v4(), Amount::from_whole(300));
        let tx = Transaction::fuel(
            "FS2025085678".to_string(),
            &sale(9.5, false),
            Amount::from_whole(100),
            Some(redemption),
            Utc::now(),
        );

        assert!(tx.redemption_applied);
        assert_eq!(tx.cashback_amount, Amount::from_whole(300));
        assert_eq!(tx.final_amount, Amount::from_whole(650));
        // points accrue on the gross amount
        assert_eq!(tx.points_earned, Amount::from_whole(9));
    }

    #[test]
    fn final_amount_floors_at_zero() {
        let redemption = (Uuid::new_v4(), Amount::from_whole(950));
        let tx = Transaction::fuel(
            "FS2025089999".to_string(),
            &sale(9.5, false),
            Amount::from_whole(100),
            Some(redemption),
            Utc::now(),
        );
        assert_eq!(tx.final_amount, Amount::ZERO);
    }

    #[test]
    fn referral_entry_is_zero_amount() {
        let tx = Transaction::referral(
            "FS2025080001".to_string(),
            Uuid::new_v4(),
            Amount::from_whole(500),
            "Referral Bonus: Asha".to_string(),
            Utc::now(),
        );

        assert_eq!(tx.kind, TransactionKind::Referral);
        assert_eq!(tx.total_amount, Amount::ZERO);
        assert_eq!(tx.final_amount, Amount::ZERO);
        assert_eq!(tx.points_earned, Amount::from_whole(500));
        assert_eq!(tx.payment_method, PaymentMethod::System);
    }

    #[test]
    fn receipt_number_shape() {
        let now = Utc::now();
        let receipt = generate_receipt_number(now);
        assert!(receipt.starts_with("FS"));
        assert_eq!(receipt.len(), 12);
        assert!(receipt[2..].chars().all(|c| c.is_ascii_digit()));
    }
}
