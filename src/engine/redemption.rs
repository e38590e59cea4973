//! Point-to-credit redemption lifecycle.
//!
//! A redemption converts earned points into a spendable cashback credit:
//! `pending` until an admin reviews it, then `approved` (points debited,
//! 30-day expiry clock starts) or `rejected`. An approved credit is
//! consumed exactly once by a recorded transaction (`applied`) or lapses
//! (`expired`). Expiry is evaluated lazily on access.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::Amount;
use crate::model::{AccountId, RedemptionId, TransactionId};

use super::error::RedemptionError;

/// Days an approved credit stays spendable.
pub const CREDIT_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Expired,
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Rejected => "rejected",
            RedemptionStatus::Applied => "applied",
            RedemptionStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedemptionType {
    Cashback,
    Discount,
    #[default]
    FuelCredit,
}

/// A request to convert points into a spendable credit.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub id: RedemptionId,
    pub account: AccountId,
    pub points_used: Amount,
    /// 1 point is pegged to 1 currency unit, so this equals `points_used`.
    pub cashback_amount: Amount,
    pub status: RedemptionStatus,
    pub redemption_type: RedemptionType,
    pub expiry_date: Option<DateTime<Utc>>,
    pub applied_in: Option<TransactionId>,
    pub applied_at: Option<DateTime<Utc>>,
    pub processed_by: Option<AccountId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Redemption {
    pub fn new(
        account: AccountId,
        points_used: Amount,
        redemption_type: RedemptionType,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            points_used,
            cashback_amount: points_used,
            status: RedemptionStatus::Pending,
            redemption_type,
            expiry_date: None,
            applied_in: None,
            applied_at: None,
            processed_by: None,
            notes,
            created_at: now,
        }
    }

    fn conflict(&self) -> RedemptionError {
        RedemptionError::Conflict {
            id: self.id,
            status: self.status,
        }
    }

    /// Approve a pending request: the points were already debited by the
    /// caller; this starts the expiry clock.
    pub fn approve(
        &mut self,
        approver: AccountId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RedemptionError> {
        if self.status != RedemptionStatus::Pending {
            return Err(self.conflict());
        }
        self.status = RedemptionStatus::Approved;
        self.expiry_date = Some(now + Duration::days(CREDIT_TTL_DAYS));
        self.processed_by = Some(approver);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    /// Reject a pending request. Terminal; no ledger effect.
    pub fn reject(
        &mut self,
        approver: AccountId,
        notes: Option<String>,
    ) -> Result<(), RedemptionError> {
        if self.status != RedemptionStatus::Pending {
            return Err(self.conflict());
        }
        self.status = RedemptionStatus::Rejected;
        self.processed_by = Some(approver);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    /// Lazily mark an approved-but-lapsed credit as expired. Returns true
    /// when the transition fired.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == RedemptionStatus::Approved
            && self.expiry_date.is_some_and(|expiry| now > expiry)
        {
            self.status = RedemptionStatus::Expired;
            return true;
        }
        false
    }

    /// Consume an approved credit from a recorded transaction. The debit
    /// happened at approval time, so applying only marks the credit spent.
    pub fn apply(
        &mut self,
        transaction: TransactionId,
        operator: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), RedemptionError> {
        self.expire_if_due(now);
        if self.status != RedemptionStatus::Approved {
            return Err(self.conflict());
        }
        self.status = RedemptionStatus::Applied;
        self.applied_in = Some(transaction);
        self.applied_at = Some(now);
        self.processed_by = Some(operator);
        Ok(())
    }

    /// Approved and not past its expiry date.
    pub fn is_spendable(&self, now: DateTime<Utc>) -> bool {
        self.status == RedemptionStatus::Approved
            && self.expiry_date.is_some_and(|expiry| now <= expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(points: i64) -> Redemption {
        Redemption::new(
            Uuid::new_v4(),
            Amount::from_whole(points),
            RedemptionType::FuelCredit,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn new_request_is_pending_with_pegged_cashback() {
        let redemption = pending(100);
        assert_eq!(redemption.status, RedemptionStatus::Pending);
        assert_eq!(redemption.cashback_amount, Amount::from_whole(100));
        assert!(redemption.expiry_date.is_none());
    }

    #[test]
    fn approve_starts_expiry_clock() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        let now = Utc::now();

        redemption.approve(admin, None, now).unwrap();

        assert_eq!(redemption.status, RedemptionStatus::Approved);
        assert_eq!(
            redemption.expiry_date,
            Some(now + Duration::days(CREDIT_TTL_DAYS))
        );
        assert_eq!(redemption.processed_by, Some(admin));
    }

    #[test]
    fn approve_twice_conflicts() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        redemption.approve(admin, None, Utc::now()).unwrap();

        let result = redemption.approve(admin, None, Utc::now());
        assert!(matches!(result, Err(RedemptionError::Conflict { .. })));
    }

    #[test]
    fn reject_is_terminal() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        redemption.reject(admin, Some("not eligible".into())).unwrap();

        assert_eq!(redemption.status, RedemptionStatus::Rejected);
        let result = redemption.approve(admin, None, Utc::now());
        assert!(matches!(result, Err(RedemptionError::Conflict { .. })));
    }

    #[test]
    fn apply_consumes_credit_once() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        let tx = Uuid::new_v4();
        redemption.approve(admin, None, Utc::now()).unwrap();

        redemption.apply(tx, admin, Utc::now()).unwrap();
        assert_eq!(redemption.status, RedemptionStatus::Applied);
        assert_eq!(redemption.applied_in, Some(tx));

        let again = redemption.apply(Uuid::new_v4(), admin, Utc::now());
        assert!(matches!(again, Err(RedemptionError::Conflict { .. })));
    }

    #[test]
    fn lapsed_credit_expires_on_apply() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        let approved_at = Utc::now() - Duration::days(CREDIT_TTL_DAYS + 1);
        redemption.approve(admin, None, approved_at).unwrap();

        let result = redemption.apply(Uuid::new_v4(), admin, Utc::now());
        assert!(matches!(result, Err(RedemptionError::Conflict { .. })));
        assert_eq!(redemption.status, RedemptionStatus::Expired);
    }

    #[test]
    fn spendable_tracks_expiry() {
        let mut redemption = pending(100);
        let admin = Uuid::new_v4();
        let now = Utc::now();
        assert!(!redemption.is_spendable(now));

        redemption.approve(admin, None, now).unwrap();
        assert!(redemption.is_spendable(now));
        assert!(!redemption.is_spendable(now + Duration::days(CREDIT_TTL_DAYS + 1)));
    }
}
