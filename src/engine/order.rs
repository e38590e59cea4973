//! Prepaid order lifecycle.
//!
//! An order is a paid-ahead fuel purchase intent: created `pending` with a
//! 24-hour fulfilment window, gated on payment, then completed (points
//! awarded) or cancelled (gross amount refunded) by an admin, or expired.
//! Status and payment status advance independently but one-directionally;
//! every transition is first-writer-wins.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;

use crate::Amount;
use crate::model::{AccountId, FuelType, PaymentMethod};

use super::error::OrderError;
use super::ledger::Account;

/// Hours an unfulfilled order stays claimable.
pub const ORDER_TTL_HOURS: i64 = 24;

/// Cash spent per point earned on prepaid orders. Accrues on the amount
/// actually paid, net of applied credits. Intentionally different from the
/// gross at-the-pump rate in the transaction recorder.
pub const CASH_PER_POINT: i64 = 50;

/// Smallest credit amount an order may apply.
pub fn min_credits() -> Amount {
    Amount::from_whole(10)
}

/// Cancelling a paid order refunds the gross total but does not restore
/// credits spent on it. Matches long-standing billing behaviour; kept as
/// an explicit policy flag. TODO: confirm with product whether cancelled
/// orders should return applied credits.
pub const FORFEIT_CREDITS_ON_CANCEL: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Expired,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    PartialRefund,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartialRefund => "partial_refund",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefundStatus {
    #[default]
    None,
    Pending,
    Processed,
    Failed,
}

/// One prepaid fuel purchase intent.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub account: AccountId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub fuel_type: FuelType,
    pub liters: Amount,
    /// Snapshot of the board price at creation; later price changes do
    /// not touch existing orders.
    pub price_per_liter: Amount,
    pub total_amount: Amount,
    pub credits_applied: Amount,
    pub final_amount: Amount,
    pub points_earned: Amount,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_ref: Option<String>,
    pub gateway_order_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub processed_by: Option<AccountId>,
    pub cancel_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub refund_amount: Option<Amount>,
    pub refund_id: Option<String>,
    pub refund_status: RefundStatus,
    pub qr_payload: String,
}

impl Order {
    /// Build a new pending order for `account`. Validates litres and the
    /// credits rules against the account's current balance; the caller
    /// still debits the credits through the ledger, whose atomic check is
    /// authoritative under concurrency.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        account: &Account,
        fuel_type: FuelType,
        liters: Amount,
        price_per_liter: Amount,
        payment_method: PaymentMethod,
        credits_applied: Amount,
        payment_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        if !liters.is_positive() {
            return Err(OrderError::InvalidLiters(liters));
        }
        let total_amount = liters * price_per_liter;

        let credits_applied = if credits_applied.is_positive() {
            if credits_applied > account.available_points() {
                return Err(OrderError::InsufficientCredits {
                    available: account.available_points(),
                    requested: credits_applied,
                });
            }
            if credits_applied < min_credits() {
                return Err(OrderError::BelowMinimum {
                    minimum: min_credits(),
                    requested: credits_applied,
                });
            }
            credits_applied.min(total_amount)
        } else {
            Amount::ZERO
        };

        let final_amount = total_amount - credits_applied;
        let points_earned = final_amount.div_round(CASH_PER_POINT);
        let paid = payment_ref.is_some();

        let mut order = Order {
            id: generate_order_id(now),
            account: account.id(),
            customer_name: account.name().to_string(),
            customer_email: account.email().to_string(),
            customer_phone: account.phone().map(str::to_string),
            fuel_type,
            liters,
            price_per_liter,
            total_amount,
            credits_applied,
            final_amount,
            points_earned,
            payment_method,
            payment_status: if paid {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            payment_ref,
            gateway_order_id: None,
            paid_at: paid.then_some(now),
            status: OrderStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(ORDER_TTL_HOURS),
            completed_at: None,
            cancelled_at: None,
            processed_by: None,
            cancel_reason: None,
            admin_notes: None,
            refund_amount: None,
            refund_id: None,
            refund_status: RefundStatus::None,
            qr_payload: String::new(),
        };
        order.qr_payload = order.render_qr_payload();
        Ok(order)
    }

    /// Re-roll the human-readable id after a store collision. The QR
    /// payload embeds the id, so it is rendered again.
    pub fn regenerate_id(&mut self, now: DateTime<Utc>) {
        self.id = generate_order_id(now);
        self.qr_payload = self.render_qr_payload();
    }

    fn conflict(&self) -> OrderError {
        OrderError::Conflict {
            order: self.id.clone(),
            status: self.status,
        }
    }

    fn payment_conflict(&self) -> OrderError {
        OrderError::PaymentConflict {
            order: self.id.clone(),
            status: self.payment_status,
        }
    }

    /// Record gateway payment confirmation.
    pub fn mark_paid(
        &mut self,
        reference: String,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(self.payment_conflict());
        }
        self.payment_status = PaymentStatus::Paid;
        self.payment_ref = Some(reference);
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn mark_payment_failed(&mut self) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(self.payment_conflict());
        }
        self.payment_status = PaymentStatus::Failed;
        Ok(())
    }

    /// Fulfilment: only an admin completes, only once, and only a paid
    /// order. The caller credits the earned points afterwards.
    pub fn complete(
        &mut self,
        admin: AccountId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if matches!(self.status, OrderStatus::Completed | OrderStatus::Cancelled) {
            return Err(self.conflict());
        }
        if self.payment_status != PaymentStatus::Paid {
            return Err(self.payment_conflict());
        }
        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        self.processed_by = Some(admin);
        if notes.is_some() {
            self.admin_notes = notes;
        }
        Ok(())
    }

    /// True when cancellation must refund the gateway charge.
    pub fn needs_refund(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if matches!(self.status, OrderStatus::Completed | OrderStatus::Cancelled) {
            return Err(self.conflict());
        }
        Ok(())
    }

    pub fn cancel(
        &mut self,
        admin: AccountId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_cancellable()?;
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason.unwrap_or_else(|| "Cancelled by admin".to_string()));
        self.processed_by = Some(admin);
        Ok(())
    }

    /// Record a settled gateway refund against this order.
    pub fn record_refund(&mut self, amount: Amount, refund_id: String) {
        self.payment_status = if amount == self.total_amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartialRefund
        };
        self.refund_status = RefundStatus::Processed;
        self.refund_amount = Some(amount);
        self.refund_id = Some(refund_id);
    }

    /// Lazily expire a pending order past its fulfilment window. Returns
    /// true when the transition fired. No ledger effect: points are only
    /// awarded at completion.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == OrderStatus::Pending && now > self.expires_at {
            self.status = OrderStatus::Expired;
            return true;
        }
        false
    }

    /// The gate an operator checks before dispensing fuel.
    pub fn is_fulfillable(&self) -> bool {
        self.status == OrderStatus::Pending && self.payment_status == PaymentStatus::Paid
    }

    fn render_qr_payload(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "fuelType": self.fuel_type.to_string(),
            "liters": self.liters.to_string(),
            "pricePerLiter": self.price_per_liter.to_string(),
            "totalAmount": self.total_amount.to_string(),
            "pointsEarned": self.points_earned.to_string(),
            "customerName": self.customer_name,
            "customerPhone": self.customer_phone,
            "status": self.status.to_string(),
            "paymentMethod": self.payment_method.to_string(),
            "createdAt": self.created_at.to_rfc3339(),
        })
        .to_string()
    }
}

/// Generate a human-readable order id: `FS-` + creation millis in base36
/// + 4 random uppercase alphanumerics.
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("FS-{}-{}", base36(now.timestamp_millis().max(0) as u64), suffix)
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}

#[derive(Debug, Deserialize)]
struct QrId {
    id: String,
}

/// Extract the order id from a scanned QR payload. The payload is either
/// the JSON object rendered at creation or the bare order id string.
pub fn order_id_from_qr(data: &str) -> String {
    match serde_json::from_str::<QrId>(data) {
        Ok(payload) => payload.id,
        Err(_) => data.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::Ledger;
    use crate::model::Role;
    use uuid::Uuid;

    fn account_with(points: i64) -> Account {
        let ledger = Ledger::new();
        let account = ledger
            .open("Asha", "asha@fuel.test", None, Role::Customer, None, Utc::now())
            .unwrap();
        ledger
            .credit(account.id(), Amount::from_whole(points))
            .unwrap();
        ledger.get(account.id()).unwrap()
    }

    fn create(
        account: &Account,
        liters: f64,
        price: f64,
        credits: i64,
        payment_ref: Option<&str>,
    ) -> Result<Order, OrderError> {
        Order::create(
            account,
            FuelType::Petrol,
            Amount::from_float(liters),
            Amount::from_float(price),
            PaymentMethod::Upi,
            Amount::from_whole(credits),
            payment_ref.map(str::to_string),
            Utc::now(),
        )
    }

    #[test]
    fn create_computes_totals_and_points() {
        let account = account_with(500);
        let order = create(&account, 10.0, 100.0, 200, None).unwrap();

        assert_eq!(order.total_amount, Amount::from_whole(1000));
        assert_eq!(order.credits_applied, Amount::from_whole(200));
        assert_eq!(order.final_amount, Amount::from_whole(800));
        // points accrue on cash actually paid: 800 / 50 = 16.00
        assert_eq!(order.points_earned, Amount::from_whole(16));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(
            order.expires_at,
            order.created_at + Duration::hours(ORDER_TTL_HOURS)
        );
    }

    #[test]
    fn create_with_payment_ref_is_paid() {
        let account = account_with(0);
        let order = create(&account, 5.0, 100.0, 0, Some("pay_123")).unwrap();

        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.payment_ref.as_deref(), Some("pay_123"));
        assert!(order.paid_at.is_some());
    }

    #[test]
    fn create_rejects_zero_liters() {
        let account = account_with(0);
        let result = create(&account, 0.0, 100.0, 0, None);
        assert!(matches!(result, Err(OrderError::InvalidLiters(_))));
    }

    #[test]
    fn create_rejects_credits_above_balance() {
        let account = account_with(50);
        let result = create(&account, 10.0, 100.0, 60, None);
        assert!(matches!(
            result,
            Err(OrderError::InsufficientCredits { .. })
        ));
    }

    #[test]
    fn create_rejects_credits_below_minimum() {
        let account = account_with(50);
        let result = create(&account, 10.0, 100.0, 5, None);
        assert!(matches!(result, Err(OrderError::BelowMinimum { .. })));
    }

    #[test]
    fn create_clamps_credits_to_total() {
        let account = account_with(500);
        let order = create(&account, 1.0, 100.0, 400, None).unwrap();

        assert_eq!(order.credits_applied, Amount::from_whole(100));
        assert_eq!(order.final_amount, Amount::ZERO);
        assert_eq!(order.points_earned, Amount::ZERO);
    }

    #[test]
    fn mark_paid_is_first_writer_wins() {
        let account = account_with(0);
        let mut order = create(&account, 5.0, 100.0, 0, None).unwrap();

        order.mark_paid("pay_1".into(), Utc::now()).unwrap();
        let again = order.mark_paid("pay_2".into(), Utc::now());
        assert!(matches!(again, Err(OrderError::PaymentConflict { .. })));
        assert_eq!(order.payment_ref.as_deref(), Some("pay_1"));
    }

    #[test]
    fn complete_requires_payment() {
        let account = account_with(0);
        let mut order = create(&account, 5.0, 100.0, 0, None).unwrap();

        let result = order.complete(Uuid::new_v4(), None, Utc::now());
        assert!(matches!(result, Err(OrderError::PaymentConflict { .. })));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn complete_then_cancel_conflicts() {
        let account = account_with(0);
        let mut order = create(&account, 5.0, 100.0, 0, Some("pay_1")).unwrap();
        let admin = Uuid::new_v4();

        order.complete(admin, None, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        let result = order.cancel(admin, None, Utc::now());
        assert!(matches!(result, Err(OrderError::Conflict { .. })));
    }

    #[test]
    fn cancel_records_reason_and_refund() {
        let account = account_with(0);
        let mut order = create(&account, 10.0, 100.0, 0, Some("pay_1")).unwrap();
        let admin = Uuid::new_v4();

        assert!(order.needs_refund());
        order.cancel(admin, Some("pump offline".into()), Utc::now()).unwrap();
        order.record_refund(order.total_amount, "rfnd_1".into());

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.refund_status, RefundStatus::Processed);
        assert_eq!(order.refund_amount, Some(Amount::from_whole(1000)));
        assert_eq!(order.cancel_reason.as_deref(), Some("pump offline"));
    }

    #[test]
    fn partial_refund_is_tracked() {
        let account = account_with(0);
        let mut order = create(&account, 10.0, 100.0, 0, Some("pay_1")).unwrap();
        order.cancel(Uuid::new_v4(), None, Utc::now()).unwrap();
        order.record_refund(Amount::from_whole(400), "rfnd_2".into());

        assert_eq!(order.payment_status, PaymentStatus::PartialRefund);
    }

    #[test]
    fn pending_order_expires_past_window() {
        let account = account_with(0);
        let mut order = create(&account, 5.0, 100.0, 0, Some("pay_1")).unwrap();

        assert!(!order.expire_if_due(Utc::now()));
        assert!(order.expire_if_due(order.expires_at + Duration::seconds(1)));
        assert_eq!(order.status, OrderStatus::Expired);
        assert!(!order.is_fulfillable());
    }

    #[test]
    fn fulfillable_means_pending_and_paid() {
        let account = account_with(0);
        let mut order = create(&account, 5.0, 100.0, 0, None).unwrap();
        assert!(!order.is_fulfillable());

        order.mark_paid("pay_1".into(), Utc::now()).unwrap();
        assert!(order.is_fulfillable());
    }

    #[test]
    fn order_id_shape() {
        let id = generate_order_id(Utc::now());
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts[0], "FS");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn qr_payload_round_trips_order_id() {
        let account = account_with(0);
        let order = create(&account, 5.0, 100.0, 0, None).unwrap();

        assert_eq!(order_id_from_qr(&order.qr_payload), order.id);
        assert_eq!(order_id_from_qr(&order.id), order.id);
    }
}
