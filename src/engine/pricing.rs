//! Admin-managed fuel price board, the pricing provider for order
//! creation and transaction recording.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::Amount;
use crate::model::FuelType;

/// Current price for one fuel type.
#[derive(Debug, Clone)]
pub struct FuelPrice {
    pub fuel_type: FuelType,
    pub price_per_liter: Amount,
    pub last_updated: DateTime<Utc>,
}

/// One price per fuel type, upserted by admins.
#[derive(Debug, Default)]
pub struct PriceBoard {
    prices: DashMap<FuelType, FuelPrice>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, fuel_type: FuelType, price_per_liter: Amount, now: DateTime<Utc>) -> FuelPrice {
        let price = FuelPrice {
            fuel_type,
            price_per_liter,
            last_updated: now,
        };
        self.prices.insert(fuel_type, price.clone());
        price
    }

    pub fn current(&self, fuel_type: FuelType) -> Option<FuelPrice> {
        self.prices.get(&fuel_type).map(|p| p.clone())
    }

    /// All prices, ordered by fuel type name.
    pub fn all(&self) -> Vec<FuelPrice> {
        let mut all: Vec<FuelPrice> = self.prices.iter().map(|p| p.clone()).collect();
        all.sort_by_key(|p| p.fuel_type.to_string());
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_upserts_price() {
        let board = PriceBoard::new();
        board.set(FuelType::Petrol, Amount::from_float(100.0), Utc::now());
        board.set(FuelType::Petrol, Amount::from_float(102.5), Utc::now());

        let price = board.current(FuelType::Petrol).unwrap();
        assert_eq!(price.price_per_liter, Amount::from_float(102.5));
        assert!(board.current(FuelType::Cng).is_none());
    }

    #[test]
    fn all_is_sorted_by_fuel_type() {
        let board = PriceBoard::new();
        board.set(FuelType::Petrol, Amount::from_whole(100), Utc::now());
        board.set(FuelType::Cng, Amount::from_whole(80), Utc::now());
        board.set(FuelType::Diesel, Amount::from_whole(90), Utc::now());

        let names: Vec<String> = board.all().iter().map(|p| p.fuel_type.to_string()).collect();
        assert_eq!(names, ["cng", "diesel", "petrol"]);
    }
}
