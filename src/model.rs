//! Core domain types shared across the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

/// Account identifier.
pub type AccountId = Uuid;

/// Redemption identifier.
pub type RedemptionId = Uuid;

/// Transaction identifier.
pub type TransactionId = Uuid;

/// Role attached to an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller of an engine operation, as supplied by the
/// identity provider. The engine trusts this as given and only checks
/// role and ownership at the operation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub account: AccountId,
    pub role: Role,
}

impl Principal {
    pub fn customer(account: AccountId) -> Self {
        Self {
            account,
            role: Role::Customer,
        }
    }

    pub fn admin(account: AccountId) -> Self {
        Self {
            account,
            role: Role::Admin,
        }
    }

    /// Principal used by batch imports and other internal callers.
    pub fn system() -> Self {
        Self {
            account: Uuid::nil(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fuel sold at the pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Cng,
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Cng => "cng",
        };
        f.write_str(name)
    }
}

impl FromStr for FuelType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "petrol" => Ok(FuelType::Petrol),
            "diesel" => Ok(FuelType::Diesel),
            "cng" => Ok(FuelType::Cng),
            _ => Err(()),
        }
    }
}

/// How a purchase was paid for. `System` marks engine-generated entries
/// such as referral bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
    Card,
    Netbanking,
    Wallet,
    Cash,
    System,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::Netbanking => "netbanking",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Cash => "cash",
            PaymentMethod::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upi" => Ok(PaymentMethod::Upi),
            "card" => Ok(PaymentMethod::Card),
            "netbanking" => Ok(PaymentMethod::Netbanking),
            "wallet" => Ok(PaymentMethod::Wallet),
            "cash" => Ok(PaymentMethod::Cash),
            "system" => Ok(PaymentMethod::System),
            _ => Err(()),
        }
    }
}

/// Category attached to an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Transaction,
    Redemption,
    Referral,
    System,
    Promo,
}

/// An event from a pump-log import, the possible inputs of
/// [`Engine::run`](crate::Engine::run).
#[derive(Debug, Clone)]
pub enum PumpEvent {
    /// Admin price upsert for one fuel type.
    SetPrice {
        fuel_type: FuelType,
        price_per_liter: Amount,
    },
    /// Customer registration, optionally carrying a referral code.
    Register {
        name: String,
        email: String,
        referral_code: Option<String>,
    },
    /// An at-the-pump fuel purchase recorded against a customer.
    Fuel {
        email: String,
        fuel_type: FuelType,
        liters: Amount,
        payment_method: PaymentMethod,
        double_points: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_type_round_trips_through_str() {
        for fuel in [FuelType::Petrol, FuelType::Diesel, FuelType::Cng] {
            assert_eq!(fuel.to_string().parse::<FuelType>(), Ok(fuel));
        }
        assert!("kerosene".parse::<FuelType>().is_err());
    }

    #[test]
    fn payment_method_round_trips_through_str() {
        for method in [
            PaymentMethod::Upi,
            PaymentMethod::Card,
            PaymentMethod::Netbanking,
            PaymentMethod::Wallet,
            PaymentMethod::Cash,
            PaymentMethod::System,
        ] {
            assert_eq!(method.to_string().parse::<PaymentMethod>(), Ok(method));
        }
    }

    #[test]
    fn system_principal_is_admin() {
        assert!(Principal::system().is_admin());
        assert!(!Principal::customer(Uuid::new_v4()).is_admin());
    }
}
