//! Loyalty and prepaid-order engine.
//!
//! The engine owns the account ledger, the fuel price board, and the
//! order / redemption / transaction records, and exposes every operation
//! the backend performs on them. State transitions are first-writer-wins:
//! a retried admin click or duplicated request fails with a conflict
//! instead of double-applying its effects. Time-based transitions (order
//! and credit expiry) are evaluated lazily on read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Amount;
use crate::external::{Notifier, PaymentGateway};
use crate::model::{
    AccountId, FuelType, NotificationKind, PaymentMethod, Principal, PumpEvent, RedemptionId,
    Role, TransactionId,
};

mod error;
pub use error::{EngineError, LedgerError, OrderError, RecordError, RedemptionError};

mod ledger;
pub use ledger::{Account, Ledger, PointCounter};

mod order;
pub use order::{FORFEIT_CREDITS_ON_CANCEL, Order, OrderStatus, PaymentStatus, RefundStatus};

mod pricing;
pub use pricing::{FuelPrice, PriceBoard};

mod redemption;
pub use redemption::{Redemption, RedemptionStatus, RedemptionType};

mod referral;

mod transaction;
pub use transaction::{PumpSale, Transaction, TransactionKind};

const CURRENCY: &str = "INR";

/// Operator-facing result of an order verification scan.
#[derive(Debug, Clone)]
pub struct OrderVerification {
    pub valid: bool,
    pub order: Order,
}

/// Aggregate order counters for the admin dashboard.
#[derive(Debug, Clone, Default)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub revenue: Amount,
}

/// The loyalty and prepaid-order engine.
pub struct Engine {
    ledger: Ledger,
    prices: PriceBoard,
    orders: DashMap<String, Order>,
    redemptions: DashMap<RedemptionId, Redemption>,
    transactions: DashMap<TransactionId, Transaction>,
    /// Receipt-number uniqueness registry.
    receipts: DashMap<String, TransactionId>,
    notifier: Arc<dyn Notifier>,
    gateway: Arc<dyn PaymentGateway>,
}

/// Accounts and registration
impl Engine {
    pub fn new(notifier: Arc<dyn Notifier>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            ledger: Ledger::new(),
            prices: PriceBoard::new(),
            orders: DashMap::new(),
            redemptions: DashMap::new(),
            transactions: DashMap::new(),
            receipts: DashMap::new(),
            notifier,
            gateway,
        }
    }

    /// Register a new account. A supplied referral code that matches an
    /// existing account pays the referrer a one-time bonus and leaves an
    /// audit transaction; an unknown code is ignored and registration
    /// still succeeds.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        role: Role,
        referral_code: Option<&str>,
    ) -> Result<Account, EngineError> {
        let now = Utc::now();
        let referrer = referral_code.and_then(|code| {
            let referrer = self.ledger.find_by_referral_code(code);
            if referrer.is_none() {
                info!(code, "unmatched referral code ignored");
            }
            referrer
        });

        let account = self.ledger.open(
            name,
            email,
            phone,
            role,
            referrer.as_ref().map(Account::id),
            now,
        )?;

        if let Some(referrer) = referrer {
            self.ledger.credit(referrer.id(), referral::referral_bonus())?;
            let receipt = self.unique_receipt(now);
            let audit = Transaction::referral(
                receipt,
                referrer.id(),
                referral::referral_bonus(),
                format!("Referral Bonus: {name}"),
                now,
            );
            self.receipts.insert(audit.receipt_number.clone(), audit.id);
            self.transactions.insert(audit.id, audit);
            info!(
                referrer = %referrer.id(),
                referred = %account.id(),
                "referral bonus credited"
            );
        }

        Ok(account)
    }

    pub fn account(&self, actor: &Principal, id: AccountId) -> Result<Account, EngineError> {
        self.require_self_or_admin(actor, id, "view this account")?;
        Ok(self.ledger.get(id).ok_or(LedgerError::AccountNotFound(id))?)
    }

    pub fn deactivate_account(
        &self,
        actor: &Principal,
        id: AccountId,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "deactivate accounts")?;
        Ok(self.ledger.deactivate(id)?)
    }

    /// Admin balance correction on one counter.
    pub fn adjust_points(
        &self,
        actor: &Principal,
        id: AccountId,
        counter: PointCounter,
        delta: Amount,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "adjust balances")?;
        Ok(self.ledger.adjust(id, counter, delta)?)
    }

    /// Snapshot of every account, ordered by email.
    pub fn accounts(&self) -> Vec<Account> {
        self.ledger.accounts()
    }
}

/// Fuel prices
impl Engine {
    pub fn set_fuel_price(
        &self,
        actor: &Principal,
        fuel_type: FuelType,
        price_per_liter: Amount,
    ) -> Result<FuelPrice, EngineError> {
        self.require_admin(actor, "set fuel prices")?;
        Ok(self.prices.set(fuel_type, price_per_liter, Utc::now()))
    }

    pub fn fuel_prices(&self) -> Vec<FuelPrice> {
        self.prices.all()
    }
}

/// Prepaid orders
impl Engine {
    /// Create a prepaid order for the calling account. Applied credits
    /// are debited immediately, before any payment settles.
    pub fn create_order(
        &self,
        actor: &Principal,
        fuel_type: FuelType,
        liters: Amount,
        payment_method: PaymentMethod,
        credits_applied: Amount,
        payment_ref: Option<String>,
    ) -> Result<Order, EngineError> {
        let now = Utc::now();
        let account = self
            .ledger
            .get(actor.account)
            .ok_or(LedgerError::AccountNotFound(actor.account))?;
        let price = self
            .prices
            .current(fuel_type)
            .ok_or(OrderError::UnknownFuelType(fuel_type))?;

        let mut order = Order::create(
            &account,
            fuel_type,
            liters,
            price.price_per_liter,
            payment_method,
            credits_applied,
            payment_ref,
            now,
        )?;

        if order.credits_applied.is_positive() {
            // the ledger's atomic check is authoritative under concurrency
            self.ledger
                .debit(account.id(), order.credits_applied)
                .map_err(|err| match err {
                    LedgerError::InsufficientBalance {
                        available,
                        requested,
                        ..
                    } => EngineError::Order(OrderError::InsufficientCredits {
                        available,
                        requested,
                    }),
                    other => EngineError::Ledger(other),
                })?;
        }

        loop {
            match self.orders.entry(order.id.clone()) {
                Entry::Occupied(_) => order.regenerate_id(now),
                Entry::Vacant(slot) => {
                    slot.insert(order.clone());
                    break;
                }
            }
        }

        info!(
            order = %order.id,
            account = %order.account,
            total = %order.total_amount,
            credits = %order.credits_applied,
            "order created"
        );
        Ok(order)
    }

    /// Ask the gateway for a charge covering the order's final amount and
    /// remember its reference.
    pub async fn begin_payment(
        &self,
        actor: &Principal,
        order_id: &str,
    ) -> Result<String, EngineError> {
        let amount = {
            let order = self
                .orders
                .get(order_id)
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
            self.require_self_or_admin(actor, order.account, "pay for this order")?;
            if order.payment_status != PaymentStatus::Pending {
                return Err(OrderError::PaymentConflict {
                    order: order.id.clone(),
                    status: order.payment_status,
                }
                .into());
            }
            order.final_amount
        };

        let charge = self.gateway.create_charge(amount, CURRENCY).await?;
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        order.gateway_order_id = Some(charge.clone());
        Ok(charge)
    }

    /// Confirm a gateway callback: the signature is verified before any
    /// state is written.
    pub async fn confirm_payment(
        &self,
        actor: &Principal,
        order_id: &str,
        payload: &str,
        reference: String,
    ) -> Result<Order, EngineError> {
        {
            let order = self
                .orders
                .get(order_id)
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
            self.require_self_or_admin(actor, order.account, "pay for this order")?;
        }

        let verified = self.gateway.verify_signature(payload).await?;
        if !verified {
            return Err(OrderError::SignatureRejected {
                order: order_id.to_string(),
            }
            .into());
        }

        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        order.mark_paid(reference, Utc::now())?;
        info!(order = %order.id, "payment confirmed");
        Ok(order.clone())
    }

    /// Record an out-of-band payment confirmation.
    pub fn mark_paid(
        &self,
        actor: &Principal,
        order_id: &str,
        reference: String,
    ) -> Result<Order, EngineError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        self.require_self_or_admin(actor, order.account, "pay for this order")?;
        order.mark_paid(reference, Utc::now())?;
        Ok(order.clone())
    }

    pub fn mark_payment_failed(
        &self,
        actor: &Principal,
        order_id: &str,
    ) -> Result<Order, EngineError> {
        self.require_admin(actor, "fail payments")?;
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        order.mark_payment_failed()?;
        Ok(order.clone())
    }

    /// Fulfil an order at the pump. Points are awarded here and only
    /// here, so fuel never dispensed never banks points.
    pub fn complete_order(
        &self,
        actor: &Principal,
        order_id: &str,
        notes: Option<String>,
    ) -> Result<Order, EngineError> {
        self.require_admin(actor, "complete orders")?;
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        order.complete(actor.account, notes, Utc::now())?;
        self.ledger.credit(order.account, order.points_earned)?;
        info!(
            order = %order.id,
            points = %order.points_earned,
            "order completed, points awarded"
        );
        Ok(order.clone())
    }

    /// Cancel an order. A paid order is refunded at the gateway for the
    /// gross total before the cancellation is committed; spent credits
    /// stay forfeited (see [`FORFEIT_CREDITS_ON_CANCEL`]).
    pub async fn cancel_order(
        &self,
        actor: &Principal,
        order_id: &str,
        reason: Option<String>,
    ) -> Result<Order, EngineError> {
        self.require_admin(actor, "cancel orders")?;

        let refund_request = {
            let order = self
                .orders
                .get(order_id)
                .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
            order.ensure_cancellable()?;
            order.needs_refund().then(|| {
                (
                    order.payment_ref.clone().unwrap_or_default(),
                    order.total_amount,
                )
            })
        };

        let refund = match refund_request {
            Some((charge_ref, amount)) => {
                let refund_id = self.gateway.refund(&charge_ref, amount).await?;
                Some((amount, refund_id))
            }
            None => None,
        };

        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        // a cancellation that raced us during the gateway call loses here
        order.cancel(actor.account, reason, Utc::now())?;
        if let Some((amount, refund_id)) = refund {
            order.record_refund(amount, refund_id);
        }
        info!(
            order = %order.id,
            refund = ?order.refund_amount,
            "order cancelled"
        );
        Ok(order.clone())
    }

    /// The fulfilment gate: resolve an order by id or scanned QR payload,
    /// apply lazy expiry, and report whether fuel may be dispensed.
    pub fn verify_order(
        &self,
        actor: &Principal,
        id_or_qr: &str,
    ) -> Result<OrderVerification, EngineError> {
        self.require_admin(actor, "verify orders")?;
        let id = order::order_id_from_qr(id_or_qr);
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        order.expire_if_due(Utc::now());
        Ok(OrderVerification {
            valid: order.is_fulfillable(),
            order: order.clone(),
        })
    }

    pub fn order(&self, actor: &Principal, order_id: &str) -> Result<Order, EngineError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        self.require_self_or_admin(actor, order.account, "view this order")?;
        order.expire_if_due(Utc::now());
        Ok(order.clone())
    }

    /// Orders belonging to one account, newest first.
    pub fn orders_for(
        &self,
        actor: &Principal,
        account: AccountId,
    ) -> Result<Vec<Order>, EngineError> {
        self.require_self_or_admin(actor, account, "view these orders")?;
        let now = Utc::now();
        let mut orders: Vec<Order> = self
            .orders
            .iter_mut()
            .filter_map(|mut entry| {
                entry.expire_if_due(now);
                (entry.account == account).then(|| entry.clone())
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// The forecourt queue: paid orders awaiting fulfilment, newest first.
    pub fn pending_orders(&self, actor: &Principal) -> Result<Vec<Order>, EngineError> {
        self.require_admin(actor, "list pending orders")?;
        let now = Utc::now();
        let mut orders: Vec<Order> = self
            .orders
            .iter_mut()
            .filter_map(|mut entry| {
                entry.expire_if_due(now);
                entry.is_fulfillable().then(|| entry.clone())
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    pub fn order_stats(&self, actor: &Principal) -> Result<OrderStats, EngineError> {
        self.require_admin(actor, "view order statistics")?;
        let now = Utc::now();
        let mut stats = OrderStats::default();
        for mut entry in self.orders.iter_mut() {
            entry.expire_if_due(now);
            stats.total += 1;
            match entry.status {
                OrderStatus::Pending | OrderStatus::Processing => stats.pending += 1,
                OrderStatus::Completed => {
                    stats.completed += 1;
                    stats.revenue += entry.total_amount;
                }
                OrderStatus::Cancelled => stats.cancelled += 1,
                OrderStatus::Expired => stats.expired += 1,
            }
        }
        Ok(stats)
    }
}

/// Redemptions
impl Engine {
    /// Ask to convert points into a spendable credit. The balance is
    /// deliberately not checked here: points may be earned or spent
    /// between request and review, so only approval checks it.
    pub fn request_redemption(
        &self,
        actor: &Principal,
        points_used: Amount,
        redemption_type: RedemptionType,
        notes: Option<String>,
    ) -> Result<Redemption, EngineError> {
        if !points_used.is_positive() {
            return Err(RedemptionError::InvalidAmount(points_used).into());
        }
        let account = self
            .ledger
            .get(actor.account)
            .ok_or(LedgerError::AccountNotFound(actor.account))?;
        let redemption = Redemption::new(
            account.id(),
            points_used,
            redemption_type,
            notes,
            Utc::now(),
        );
        self.redemptions.insert(redemption.id, redemption.clone());
        Ok(redemption)
    }

    /// Approve a pending redemption: debits the points (atomically, so a
    /// racing approval against the same balance cannot also succeed) and
    /// starts the 30-day expiry clock.
    pub async fn approve_redemption(
        &self,
        actor: &Principal,
        id: RedemptionId,
        notes: Option<String>,
    ) -> Result<Redemption, EngineError> {
        self.require_admin(actor, "approve redemptions")?;
        let approved = {
            let mut redemption = self
                .redemptions
                .get_mut(&id)
                .ok_or(RedemptionError::NotFound(id))?;
            if redemption.status != RedemptionStatus::Pending {
                return Err(RedemptionError::Conflict {
                    id,
                    status: redemption.status,
                }
                .into());
            }
            self.ledger.debit(redemption.account, redemption.points_used)?;
            redemption.approve(actor.account, notes, Utc::now())?;
            redemption.clone()
        };

        self.notify_quietly(
            approved.account,
            "Redemption Approved",
            format!(
                "Your redemption request for {} points ({} cashback) has been approved",
                approved.points_used, approved.cashback_amount
            ),
            NotificationKind::Redemption,
            serde_json::json!({ "redemptionId": approved.id }),
        )
        .await;
        Ok(approved)
    }

    pub async fn reject_redemption(
        &self,
        actor: &Principal,
        id: RedemptionId,
        notes: Option<String>,
    ) -> Result<Redemption, EngineError> {
        self.require_admin(actor, "reject redemptions")?;
        let rejected = {
            let mut redemption = self
                .redemptions
                .get_mut(&id)
                .ok_or(RedemptionError::NotFound(id))?;
            redemption.reject(actor.account, notes)?;
            redemption.clone()
        };

        self.notify_quietly(
            rejected.account,
            "Redemption Rejected",
            format!(
                "Your redemption request for {} points was rejected",
                rejected.points_used
            ),
            NotificationKind::Redemption,
            serde_json::json!({ "redemptionId": rejected.id }),
        )
        .await;
        Ok(rejected)
    }

    /// Unexpired approved credits for one account, oldest first: the
    /// spend order offered to the operator recording a sale.
    pub fn approved_credits_for(
        &self,
        actor: &Principal,
        account: AccountId,
    ) -> Result<Vec<Redemption>, EngineError> {
        self.require_self_or_admin(actor, account, "view these credits")?;
        let now = Utc::now();
        let mut credits: Vec<Redemption> = self
            .redemptions
            .iter_mut()
            .filter_map(|mut entry| {
                entry.expire_if_due(now);
                (entry.account == account && entry.is_spendable(now)).then(|| entry.clone())
            })
            .collect();
        credits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(credits)
    }

    /// All redemptions for one account, newest first.
    pub fn redemptions_for(
        &self,
        actor: &Principal,
        account: AccountId,
    ) -> Result<Vec<Redemption>, EngineError> {
        self.require_self_or_admin(actor, account, "view these redemptions")?;
        let now = Utc::now();
        let mut all: Vec<Redemption> = self
            .redemptions
            .iter_mut()
            .filter_map(|mut entry| {
                entry.expire_if_due(now);
                (entry.account == account).then(|| entry.clone())
            })
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

/// Pump transactions
impl Engine {
    /// Record an at-the-pump sale, optionally consuming one approved
    /// redemption credit, and award points on the gross amount.
    pub async fn record_transaction(
        &self,
        actor: &Principal,
        sale: PumpSale,
    ) -> Result<Transaction, EngineError> {
        self.require_admin(actor, "record transactions")?;
        let now = Utc::now();
        let account = self
            .ledger
            .get(sale.account)
            .ok_or(LedgerError::AccountNotFound(sale.account))?;
        if !sale.liters.is_positive() {
            return Err(RecordError::InvalidLiters(sale.liters).into());
        }
        let price = self
            .prices
            .current(sale.fuel_type)
            .ok_or(RecordError::UnknownFuelType(sale.fuel_type))?;
        let total_amount = sale.liters * price.price_per_liter;

        let tx = match sale.redemption {
            Some(redemption_id) => {
                let mut redemption = self
                    .redemptions
                    .get_mut(&redemption_id)
                    .ok_or(RedemptionError::NotFound(redemption_id))?;
                if redemption.account != sale.account {
                    return Err(RedemptionError::AccountMismatch {
                        id: redemption_id,
                        owner: redemption.account,
                        requested: sale.account,
                    }
                    .into());
                }
                redemption.expire_if_due(now);
                if redemption.status != RedemptionStatus::Approved {
                    return Err(RedemptionError::Conflict {
                        id: redemption_id,
                        status: redemption.status,
                    }
                    .into());
                }
                if redemption.cashback_amount > total_amount {
                    return Err(RecordError::AmountExceeded {
                        cashback: redemption.cashback_amount,
                        total: total_amount,
                    }
                    .into());
                }
                let receipt = self.unique_receipt(now);
                let tx = Transaction::fuel(
                    receipt,
                    &sale,
                    price.price_per_liter,
                    Some((redemption_id, redemption.cashback_amount)),
                    now,
                );
                redemption.apply(tx.id, actor.account, now)?;
                tx
            }
            None => {
                let receipt = self.unique_receipt(now);
                Transaction::fuel(receipt, &sale, price.price_per_liter, None, now)
            }
        };

        self.receipts.insert(tx.receipt_number.clone(), tx.id);
        self.transactions.insert(tx.id, tx.clone());
        self.ledger.credit(sale.account, tx.points_earned)?;
        info!(
            receipt = %tx.receipt_number,
            account = %tx.account,
            total = %tx.total_amount,
            points = %tx.points_earned,
            "transaction recorded"
        );

        self.notify_quietly(
            account.id(),
            "Transaction Recorded",
            format!(
                "You earned {} points from your {} purchase of {}L ({})",
                tx.points_earned,
                sale.fuel_type,
                sale.liters,
                tx.total_amount
            ),
            NotificationKind::Transaction,
            serde_json::json!({ "receiptNumber": tx.receipt_number }),
        )
        .await;
        Ok(tx)
    }

    /// Transactions for one account, newest first.
    pub fn transactions_for(
        &self,
        actor: &Principal,
        account: AccountId,
    ) -> Result<Vec<Transaction>, EngineError> {
        self.require_self_or_admin(actor, account, "view these transactions")?;
        let mut all: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.account == account)
            .map(|entry| entry.clone())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    pub fn transaction_by_receipt(
        &self,
        actor: &Principal,
        receipt: &str,
    ) -> Result<Transaction, EngineError> {
        self.require_admin(actor, "look up receipts")?;
        self.receipts
            .get(receipt)
            .map(|entry| *entry)
            .filter(|id| !id.is_nil())
            .and_then(|id| self.transactions.get(&id).map(|tx| tx.clone()))
            .ok_or_else(|| RecordError::UnknownReceipt(receipt.to_string()).into())
    }
}

/// Batch import
impl Engine {
    /// Replay a stream of pump-log events. Failed events are logged and
    /// skipped; the import never stops on a bad row.
    pub async fn run(&self, mut stream: impl Stream<Item = PumpEvent> + Unpin) {
        let operator = Principal::system();
        while let Some(event) = stream.next().await {
            let _ = self.apply(&operator, event).await;
        }
    }

    /// Apply a single pump-log event.
    pub async fn apply(
        &self,
        operator: &Principal,
        event: PumpEvent,
    ) -> Result<(), EngineError> {
        match event {
            PumpEvent::SetPrice {
                fuel_type,
                price_per_liter,
            } => {
                let result = self
                    .set_fuel_price(operator, fuel_type, price_per_liter)
                    .map(|_| ());
                Self::log_result("price", &fuel_type.to_string(), &result);
                result
            }
            PumpEvent::Register {
                name,
                email,
                referral_code,
            } => {
                let result = self
                    .register(&name, &email, None, Role::Customer, referral_code.as_deref())
                    .map(|_| ());
                Self::log_result("register", &email, &result);
                result
            }
            PumpEvent::Fuel {
                email,
                fuel_type,
                liters,
                payment_method,
                double_points,
            } => {
                let result = match self.ledger.find_by_email(&email) {
                    Some(account) => self
                        .record_transaction(
                            operator,
                            PumpSale {
                                account: account.id(),
                                fuel_type,
                                liters,
                                payment_method,
                                pump_operator: None,
                                double_points,
                                redemption: None,
                                notes: None,
                            },
                        )
                        .await
                        .map(|_| ()),
                    None => Err(LedgerError::UnknownEmail(email.clone()).into()),
                };
                Self::log_result("fuel", &email, &result);
                result
            }
        }
    }
}

/// Private helpers
impl Engine {
    fn require_admin(&self, actor: &Principal, action: &'static str) -> Result<(), EngineError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                account: actor.account,
                action,
            })
        }
    }

    fn require_self_or_admin(
        &self,
        actor: &Principal,
        target: AccountId,
        action: &'static str,
    ) -> Result<(), EngineError> {
        if actor.is_admin() || actor.account == target {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                account: actor.account,
                action,
            })
        }
    }

    /// Draw an unused receipt number and reserve it.
    fn unique_receipt(&self, now: DateTime<Utc>) -> String {
        loop {
            let receipt = transaction::generate_receipt_number(now);
            if let Entry::Vacant(slot) = self.receipts.entry(receipt.clone()) {
                slot.insert(Uuid::nil());
                return receipt;
            }
        }
    }

    async fn notify_quietly(
        &self,
        account: AccountId,
        title: &str,
        body: String,
        kind: NotificationKind,
        context: serde_json::Value,
    ) {
        if let Err(err) = self
            .notifier
            .notify(account, title, &body, kind, context)
            .await
        {
            warn!(%account, error = %err, "notification dropped");
        }
    }

    /// Small helper to log `apply` results
    fn log_result(event_type: &str, subject: &str, result: &Result<(), EngineError>) {
        match result {
            Ok(()) => info!(subject, "{event_type} applied"),
            Err(err) => info!(subject, reason = %err, "{event_type} skipped"),
        }
    }
}
