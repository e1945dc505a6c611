//! Terminal stand-in for the payment gateway's checkout screen.

use async_trait::async_trait;
use checkout::{PaymentFlow, PaymentOutcome, PaymentReceipt};
use model::api::{GatewayOrder, PlacedOrder};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Shows the gateway handle and reads the payment id and signature the
/// gateway returned from stdin. An empty payment id cancels.
pub(crate) struct StdinPaymentFlow {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinPaymentFlow {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn prompt(&self, label: &str) -> std::io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
        let line = self.lines.lock().await.next_line().await?;
        Ok(line.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl PaymentFlow for StdinPaymentFlow {
    async fn collect(&self, handle: &GatewayOrder, order: &PlacedOrder) -> PaymentOutcome {
        // Gateway amounts are in the minor unit.
        let amount = Decimal::new(handle.amount, 2);
        println!(
            "Pay {amount} {} for order {} (gateway order {}, key {})",
            handle.currency, order.order_id, handle.order_id, handle.key
        );

        let payment_id = match self.prompt("Payment id (empty to cancel): ").await {
            Ok(id) if id.is_empty() => return PaymentOutcome::Cancelled,
            Ok(id) => id,
            Err(e) => return PaymentOutcome::Failed(format!("could not read payment id: {e}")),
        };
        let signature = match self.prompt("Signature: ").await {
            Ok(sig) if sig.is_empty() => {
                return PaymentOutcome::Failed("the gateway returned no signature".into());
            }
            Ok(sig) => sig,
            Err(e) => return PaymentOutcome::Failed(format!("could not read signature: {e}")),
        };

        PaymentOutcome::Authorized(PaymentReceipt {
            gateway_order_id: handle.order_id.clone(),
            payment_id,
            signature,
        })
    }
}
