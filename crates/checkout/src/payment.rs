//! Seam to the online payment gateway's customer-facing flow.

use async_trait::async_trait;
use model::api::{GatewayOrder, PlacedOrder};

/// Identifiers the gateway hands back after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Authorized(PaymentReceipt),
    /// The customer closed the payment screen.
    Cancelled,
    Failed(String),
}

/// # PaymentFlow
///
/// Opens the gateway's payment screen for an order that was just created and
/// reports how it ended. Implementations block the checkout until the
/// customer finishes or dismisses it.
#[async_trait]
pub trait PaymentFlow: Send + Sync {
    async fn collect(&self, handle: &GatewayOrder, order: &PlacedOrder) -> PaymentOutcome;
}
