//! # Backend Gateway Layer
//!
//! This crate provides the traits the checkout core uses to reach the
//! storefront REST backend, one per collaborator (pricing, orders, wallet,
//! zones), and [`HttpGateway`], a `reqwest` implementation of all of them.
//! The service crates depend only on the traits, so tests can inject fakes.

mod http;

pub use http::HttpGateway;

use std::time::Duration;

use async_trait::async_trait;
use model::api::{OrderCreated, OrderRequest, PaymentVerification, PricingRequest};
use model::{FeeSettings, PricingBreakdown, Zone};
use rust_decimal::Decimal;
use thiserror::Error;

/// # GatewayError
///
/// Failures talking to the backend. Network-level problems, timeouts and
/// explicit rejections are kept apart because callers recover from each of
/// them differently.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Network(String),
    /// The backend did not answer within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The resource does not exist.
    #[error("Not found")]
    NotFound,
    /// The backend answered with an error status or `success: false`.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// True for failures where no answer came back from the backend.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Timeout(_))
    }
}

/// # PricingGateway
///
/// Server-side price computation and the fee schedule behind it.
#[async_trait]
pub trait PricingGateway: Send + Sync {
    /// Computes authoritative totals for a cart.
    async fn calculate_pricing(
        &self,
        request: &PricingRequest,
    ) -> Result<PricingBreakdown, GatewayError>;

    /// Current default fees, used only for local estimates.
    async fn fee_settings(&self) -> Result<FeeSettings, GatewayError>;
}

/// # OrderGateway
///
/// Order creation and online payment verification.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Creates an order. Online payments get a gateway handle in the response.
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderCreated, GatewayError>;

    /// Confirms a gateway payment with the backend.
    async fn verify_payment(&self, verification: &PaymentVerification)
    -> Result<(), GatewayError>;
}

/// Stored-balance lookups.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    async fn wallet_balance(&self) -> Result<Decimal, GatewayError>;
}

/// Service-area detection.
#[async_trait]
pub trait ZoneGateway: Send + Sync {
    /// Zone serving the coordinates, `None` when the location is not served.
    async fn detect_zone(&self, latitude: f64, longitude: f64)
    -> Result<Option<Zone>, GatewayError>;
}
