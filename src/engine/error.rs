//! Error types for engine operations.

use thiserror::Error;

use crate::Amount;
use crate::external::GatewayError;
use crate::model::{AccountId, FuelType, RedemptionId};

use super::order::{OrderStatus, PaymentStatus};
use super::redemption::RedemptionStatus;

/// Top-level error returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Redemption(#[from] RedemptionError),

    #[error("{0}")]
    Record(#[from] RecordError),

    #[error("account {account} is not allowed to {action}")]
    Unauthorized {
        account: AccountId,
        action: &'static str,
    },

    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

/// Error from ledger balance operations and account lookups.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("no account registered for {0}")]
    UnknownEmail(String),

    #[error("insufficient balance for account {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("invalid point amount {0}")]
    InvalidAmount(Amount),
}

/// Error from the prepaid order state machine.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("order {order} is {status}, transition not allowed")]
    Conflict { order: String, status: OrderStatus },

    #[error("order {order} payment is {status}, transition not allowed")]
    PaymentConflict {
        order: String,
        status: PaymentStatus,
    },

    #[error("no price set for fuel type {0}")]
    UnknownFuelType(FuelType),

    #[error("invalid litre quantity {0}")]
    InvalidLiters(Amount),

    #[error("insufficient credits: available {available}, requested {requested}")]
    InsufficientCredits {
        available: Amount,
        requested: Amount,
    },

    #[error("at least {minimum} credits required to apply, got {requested}")]
    BelowMinimum { minimum: Amount, requested: Amount },

    #[error("payment signature rejected for order {order}")]
    SignatureRejected { order: String },
}

/// Error from the redemption state machine.
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("redemption {0} not found")]
    NotFound(RedemptionId),

    #[error("redemption {id} is {status}, transition not allowed")]
    Conflict {
        id: RedemptionId,
        status: RedemptionStatus,
    },

    #[error("redemption amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("redemption {id} belongs to account {owner}, not {requested}")]
    AccountMismatch {
        id: RedemptionId,
        owner: AccountId,
        requested: AccountId,
    },
}

/// Error from recording an at-the-pump transaction.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no price set for fuel type {0}")]
    UnknownFuelType(FuelType),

    #[error("invalid litre quantity {0}")]
    InvalidLiters(Amount),

    #[error("redemption credit {cashback} exceeds transaction amount {total}")]
    AmountExceeded { cashback: Amount, total: Amount },

    #[error("no transaction with receipt number {0}")]
    UnknownReceipt(String),
}
