//! Boundary contracts consumed by the engine: notification delivery and
//! the payment gateway. Both are fallible external calls; the engine never
//! lets their failures corrupt ledger or order state.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use thiserror::Error;

use crate::Amount;
use crate::model::{AccountId, NotificationKind};

/// Failure raised by a [`Notifier`] implementation. Always logged and
/// swallowed by the caller.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        account: AccountId,
        title: &str,
        body: &str,
        kind: NotificationKind,
        context: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log. Used by the CLI importer.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        account: AccountId,
        title: &str,
        _body: &str,
        kind: NotificationKind,
        _context: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(%account, ?kind, title, "notification");
        Ok(())
    }
}

/// Transient failure from the payment gateway.
#[derive(Debug, Error)]
#[error("payment gateway error: {0}")]
pub struct GatewayError(pub String);

/// External payment gateway: charge creation, callback signature
/// verification, and refunds.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge and return its gateway reference.
    async fn create_charge(&self, amount: Amount, currency: &str) -> Result<String, GatewayError>;

    /// Verify the signature on a gateway callback payload.
    async fn verify_signature(&self, payload: &str) -> Result<bool, GatewayError>;

    /// Refund a settled charge and return the refund reference.
    async fn refund(&self, charge_ref: &str, amount: Amount) -> Result<String, GatewayError>;
}

/// Gateway stand-in that accepts every signature and fabricates
/// references, mirroring the upstream provider's id shapes. Used by the
/// CLI importer and tests.
#[derive(Debug, Default)]
pub struct SimulatedGateway;

fn suffix() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_charge(&self, amount: Amount, currency: &str) -> Result<String, GatewayError> {
        let reference = format!("order_{}_{}", Utc::now().timestamp_millis(), suffix());
        tracing::debug!(%amount, currency, reference, "simulated charge created");
        Ok(reference)
    }

    async fn verify_signature(&self, _payload: &str) -> Result<bool, GatewayError> {
        Ok(true)
    }

    async fn refund(&self, charge_ref: &str, amount: Amount) -> Result<String, GatewayError> {
        let reference = format!("rfnd_{}_{}", Utc::now().timestamp_millis(), suffix());
        tracing::debug!(%amount, charge_ref, reference, "simulated refund issued");
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_gateway_accepts_signatures() {
        let gateway = SimulatedGateway;
        assert!(gateway.verify_signature("{}").await.unwrap());
    }

    #[tokio::test]
    async fn simulated_gateway_references_are_prefixed() {
        let gateway = SimulatedGateway;
        let charge = gateway
            .create_charge(Amount::from_whole(100), "INR")
            .await
            .unwrap();
        assert!(charge.starts_with("order_"));

        let refund = gateway.refund(&charge, Amount::from_whole(100)).await.unwrap();
        assert!(refund.starts_with("rfnd_"));
    }
}
