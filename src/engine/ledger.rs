//! Account registry and the points ledger.
//!
//! The ledger is the single point of truth for an account's three point
//! counters. Every balance mutation in the crate funnels through
//! [`Ledger::credit`], [`Ledger::debit`], or [`Ledger::adjust`]; nothing
//! else writes the counters. Mutations happen under the map's per-entry
//! lock, so concurrent debits against one account are linearized and can
//! never jointly overdraw it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use crate::Amount;
use crate::model::{AccountId, Role};

use super::error::LedgerError;
use super::referral;

/// A registered user (customer or admin) with its point counters.
#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    name: String,
    email: String,
    phone: Option<String>,
    role: Role,
    total_points: Amount,
    available_points: Amount,
    redeemed_points: Amount,
    referral_code: String,
    referred_by: Option<AccountId>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Cumulative points ever earned.
    pub fn total_points(&self) -> Amount {
        self.total_points
    }

    /// Points spendable right now.
    pub fn available_points(&self) -> Amount {
        self.available_points
    }

    /// Cumulative points ever redeemed.
    pub fn redeemed_points(&self) -> Amount {
        self.redeemed_points
    }

    pub fn referral_code(&self) -> &str {
        &self.referral_code
    }

    pub fn referred_by(&self) -> Option<AccountId> {
        self.referred_by
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Which counter an admin correction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCounter {
    Total,
    Available,
    Redeemed,
}

/// The account registry and balance ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<AccountId, Account>,
    by_email: DashMap<String, AccountId>,
    by_code: DashMap<String, AccountId>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new account. Emails are unique (case-insensitive); the fresh
    /// referral code is reserved atomically so codes are never reused.
    pub fn open(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        role: Role,
        referred_by: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let id = Uuid::new_v4();
        let email = email.trim().to_ascii_lowercase();

        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::EmailTaken(email)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let referral_code = loop {
            let code = referral::generate_referral_code();
            if let Entry::Vacant(slot) = self.by_code.entry(code.clone()) {
                slot.insert(id);
                break code;
            }
        };

        let account = Account {
            id,
            name: name.to_string(),
            email,
            phone,
            role,
            total_points: Amount::ZERO,
            available_points: Amount::ZERO,
            redeemed_points: Amount::ZERO,
            referral_code,
            referred_by,
            active: true,
            created_at: now,
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    /// Earn `points`: raises both the lifetime total and the available
    /// balance. Negative credits are rejected; zero is a no-op earn.
    pub fn credit(&self, id: AccountId, points: Amount) -> Result<(), LedgerError> {
        if points.is_negative() {
            return Err(LedgerError::InvalidAmount(points));
        }
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.total_points += points;
        account.available_points += points;
        Ok(())
    }

    /// Spend `points` from the available balance. The check and the write
    /// happen under the entry lock: of two racing debits whose sum exceeds
    /// the balance, exactly one succeeds.
    pub fn debit(&self, id: AccountId, points: Amount) -> Result<(), LedgerError> {
        if !points.is_positive() {
            return Err(LedgerError::InvalidAmount(points));
        }
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        if account.available_points < points {
            return Err(LedgerError::InsufficientBalance {
                account: id,
                available: account.available_points,
                requested: points,
            });
        }
        account.available_points -= points;
        account.redeemed_points += points;
        Ok(())
    }

    /// Admin correction: unconstrained add/subtract on one counter.
    pub fn adjust(
        &self,
        id: AccountId,
        counter: PointCounter,
        delta: Amount,
    ) -> Result<(), LedgerError> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        match counter {
            PointCounter::Total => account.total_points += delta,
            PointCounter::Available => account.available_points += delta,
            PointCounter::Redeemed => account.redeemed_points += delta,
        }
        info!(account = %id, ?counter, delta = %delta, "balance adjusted");
        Ok(())
    }

    /// Soft-deactivate: the account stays on the books because financial
    /// history references it.
    pub fn deactivate(&self, id: AccountId) -> Result<(), LedgerError> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.active = false;
        Ok(())
    }

    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|a| a.clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<Account> {
        let email = email.trim().to_ascii_lowercase();
        let id = *self.by_email.get(&email)?;
        self.get(id)
    }

    /// Referral codes match case-insensitively.
    pub fn find_by_referral_code(&self, code: &str) -> Option<Account> {
        let code = code.trim().to_ascii_uppercase();
        let id = *self.by_code.get(&code)?;
        self.get(id)
    }

    /// Snapshot of every account, ordered by email.
    pub fn accounts(&self) -> Vec<Account> {
        let mut all: Vec<Account> = self.accounts.iter().map(|a| a.clone()).collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }
}
