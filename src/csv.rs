use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::engine::Account;
use crate::model::PumpEvent;
use crate::{Amount, FuelType, PaymentMethod};

/// Errors that can occur when parsing pump-log rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized event type '{event_type}'")]
    UnrecognizedType { line: usize, event_type: String },

    #[error("line {line}: {event_type} missing field '{field}'")]
    MissingField {
        line: usize,
        event_type: &'static str,
        field: &'static str,
    },

    #[error("line {line}: invalid value '{value}' for field '{field}'")]
    InvalidValue {
        line: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Serialize)]
struct OutputRow {
    email: String,
    total: String,
    available: String,
    redeemed: String,
}

/// Read pump-log events from a csv file. Rows are headerless and vary by
/// event type:
///
/// - `price,<fuel>,<per-litre>`
/// - `register,<name>,<email>[,<referral code>]`
/// - `fuel,<email>,<fuel>,<litres>,<method>,<double>`
pub fn read_events(
    path: impl AsRef<Path>,
) -> impl Iterator<Item = Result<PumpEvent, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_records()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 1;
            let record = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_record(line, &record)
        })
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    line: usize,
    event_type: &'static str,
    name: &'static str,
) -> Result<&'a str, CsvError> {
    match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CsvError::MissingField {
            line,
            event_type,
            field: name,
        }),
    }
}

fn parse_fuel(value: &str, line: usize) -> Result<FuelType, CsvError> {
    value.parse().map_err(|_| CsvError::InvalidValue {
        line,
        field: "fuel",
        value: value.to_string(),
    })
}

fn parse_amount(value: &str, field: &'static str, line: usize) -> Result<Amount, CsvError> {
    value
        .parse::<f64>()
        .map(Amount::from_float)
        .map_err(|_| CsvError::InvalidValue {
            line,
            field,
            value: value.to_string(),
        })
}

fn parse_record(line: usize, record: &csv::StringRecord) -> Result<PumpEvent, CsvError> {
    let event_type = record.get(0).unwrap_or_default();
    match event_type {
        "price" => {
            let fuel = field(record, 1, line, "price", "fuel")?;
            let price = field(record, 2, line, "price", "per-litre")?;
            Ok(PumpEvent::SetPrice {
                fuel_type: parse_fuel(fuel, line)?,
                price_per_liter: parse_amount(price, "per-litre", line)?,
            })
        }
        "register" => {
            let name = field(record, 1, line, "register", "name")?;
            let email = field(record, 2, line, "register", "email")?;
            let referral_code = record
                .get(3)
                .filter(|code| !code.is_empty())
                .map(str::to_string);
            Ok(PumpEvent::Register {
                name: name.to_string(),
                email: email.to_string(),
                referral_code,
            })
        }
        "fuel" => {
            let email = field(record, 1, line, "fuel", "email")?;
            let fuel = field(record, 2, line, "fuel", "fuel")?;
            let liters = field(record, 3, line, "fuel", "litres")?;
            let method = field(record, 4, line, "fuel", "method")?;
            let double = field(record, 5, line, "fuel", "double")?;
            Ok(PumpEvent::Fuel {
                email: email.to_string(),
                fuel_type: parse_fuel(fuel, line)?,
                liters: parse_amount(liters, "litres", line)?,
                payment_method: method.parse::<PaymentMethod>().map_err(|_| {
                    CsvError::InvalidValue {
                        line,
                        field: "method",
                        value: method.to_string(),
                    }
                })?,
                double_points: double.parse::<bool>().map_err(|_| {
                    CsvError::InvalidValue {
                        line,
                        field: "double",
                        value: double.to_string(),
                    }
                })?,
            })
        }
        other => Err(CsvError::UnrecognizedType {
            line,
            event_type: other.to_string(),
        }),
    }
}

/// write account balances to stdout in csv format
pub fn write_balances(accounts: impl IntoIterator<Item = Account>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for account in accounts {
        let row = OutputRow {
            email: account.email().to_string(),
            total: account.total_points().to_string(),
            available: account.available_points().to_string(),
            redeemed: account.redeemed_points().to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
