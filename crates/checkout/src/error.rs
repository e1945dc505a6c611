//! Checkout failures and how the customer recovers from each.

use gateway::GatewayError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Preconditions checked before every submission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Select a delivery address before placing the order")]
    MissingAddress,
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Could not tell which restaurant this order is for. Reopen the restaurant page and try again")]
    UnknownRestaurant,
    /// Cart items still disagree with the resolved restaurant after cleanup.
    #[error("Your cart no longer matches {restaurant}. Refresh and try again")]
    StaleCart { restaurant: String },
    #[error("Pricing is not available for this cart right now")]
    PricingUnavailable,
    #[error("Insufficient wallet balance: {balance} available, {total} needed ({shortfall} short)")]
    InsufficientBalance {
        balance: Decimal,
        total: Decimal,
        shortfall: Decimal,
    },
}

/// # CheckoutError
///
/// Every way a checkout attempt can end without an order. Each variant has
/// its own message, and [`CheckoutError::recovery`] tells the caller which
/// retry action applies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The cart mixed restaurants; it was cleaned up and the attempt aborted.
    #[error(
        "Your cart had items from more than one restaurant. We kept the items from {kept} and removed {removed} other item(s). Review your cart and place the order again"
    )]
    RestaurantMismatch { kept: String, removed: usize },
    #[error("Could not reach the server ({0}). Check your connection and try again")]
    NetworkUnavailable(String),
    #[error("The server took too long to respond. Try again")]
    Timeout,
    #[error("{0}")]
    ServerRejected(String),
    #[error("Payment was cancelled")]
    PaymentCancelled,
    #[error("Payment failed: {0}. You can try paying again")]
    PaymentFailed(String),
    /// The gateway took the payment but the backend did not confirm it.
    #[error(
        "We could not confirm your payment for order {order_id} ({reason}). If money was deducted, contact support with this order number"
    )]
    PaymentVerificationFailed { order_id: String, reason: String },
    #[error("An order is already being placed")]
    AlreadyInFlight,
}

/// What the customer should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Correct the input (address, cart, payment method) and retry.
    FixInput,
    /// Wait for connectivity and retry.
    Reconnect,
    /// Start the payment again.
    RetryPayment,
    /// Do not retry; money may have moved.
    ContactSupport,
    /// Wait for the running attempt to finish.
    Wait,
}

impl CheckoutError {
    pub fn recovery(&self) -> Recovery {
        match self {
            CheckoutError::Validation(_)
            | CheckoutError::RestaurantMismatch { .. }
            | CheckoutError::ServerRejected(_) => Recovery::FixInput,
            CheckoutError::NetworkUnavailable(_) | CheckoutError::Timeout => Recovery::Reconnect,
            CheckoutError::PaymentCancelled | CheckoutError::PaymentFailed(_) => {
                Recovery::RetryPayment
            }
            CheckoutError::PaymentVerificationFailed { .. } => Recovery::ContactSupport,
            CheckoutError::AlreadyInFlight => Recovery::Wait,
        }
    }
}

impl From<GatewayError> for CheckoutError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Network(reason) => CheckoutError::NetworkUnavailable(reason),
            GatewayError::Timeout(_) => CheckoutError::Timeout,
            GatewayError::Rejected { message, .. } => CheckoutError::ServerRejected(message),
            GatewayError::NotFound => {
                CheckoutError::ServerRejected("The requested resource no longer exists".into())
            }
            GatewayError::Decode(_) => {
                CheckoutError::ServerRejected("The server sent an unexpected response".into())
            }
        }
    }
}
