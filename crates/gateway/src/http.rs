//! `reqwest` implementation of the gateway traits.

use std::time::Duration;

use async_trait::async_trait;
use model::api::{
    ApiResponse, OrderCreated, OrderRequest, PaymentVerification, PricingData,
    PricingRequest, WalletData, ZoneData,
};
use model::{FeeSettings, PricingBreakdown, Zone};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::{GatewayError, OrderGateway, PricingGateway, WalletGateway, ZoneGateway};

/// HTTP client for the storefront backend.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
    auth_token: Option<String>,
}

impl HttpGateway {
    /// Creates a gateway rooted at `base_url` (e.g. "http://localhost:5000/api").
    ///
    /// # Errors
    /// Returns [`GatewayError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            auth_token: None,
        })
    }

    /// Sends `token` as a bearer token on every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let request = self.client.get(self.url(path)).query(query);
        self.execute(request, path).await?.ok_or_else(|| missing_data(path))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, GatewayError> {
        let request = self.client.post(self.url(path)).json(body);
        self.execute(request, path).await
    }

    /// Sends the request and unwraps the `{success, message, data}` envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<Option<T>, GatewayError> {
        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        debug!(path, status = status.as_u16(), "Backend responded");

        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            warn!(path, status = status.as_u16(), %message, "Backend rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string());
            warn!(path, %message, "Backend reported failure");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(envelope.data)
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

fn missing_data(path: &str) -> GatewayError {
    GatewayError::Decode(format!("response from {path} carried no data"))
}

#[async_trait]
impl PricingGateway for HttpGateway {
    #[instrument(skip(self, request), fields(restaurant_id = %request.restaurant_id))]
    async fn calculate_pricing(
        &self,
        request: &PricingRequest,
    ) -> Result<PricingBreakdown, GatewayError> {
        let path = "/pricing/calculate";
        let data: Option<PricingData> = self.post(path, request).await?;
        data.map(|d| d.pricing).ok_or_else(|| missing_data(path))
    }

    #[instrument(skip(self))]
    async fn fee_settings(&self) -> Result<FeeSettings, GatewayError> {
        self.get("/settings/fees", &[]).await
    }
}

#[async_trait]
impl OrderGateway for HttpGateway {
    #[instrument(skip(self, request), fields(restaurant_id = %request.restaurant_id))]
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderCreated, GatewayError> {
        let path = "/orders";
        let data: Option<OrderCreated> = self.post(path, request).await?;
        data.ok_or_else(|| missing_data(path))
    }

    #[instrument(skip(self, verification), fields(order_id = %verification.order_id))]
    async fn verify_payment(
        &self,
        verification: &PaymentVerification,
    ) -> Result<(), GatewayError> {
        let _: Option<serde_json::Value> =
            self.post("/orders/verify-payment", verification).await?;
        Ok(())
    }
}

#[async_trait]
impl WalletGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn wallet_balance(&self) -> Result<Decimal, GatewayError> {
        let data: WalletData = self.get("/wallet", &[]).await?;
        Ok(data.wallet.balance)
    }
}

#[async_trait]
impl ZoneGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn detect_zone(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Zone>, GatewayError> {
        let query = [("lat", latitude.to_string()), ("lng", longitude.to_string())];
        match self.get::<ZoneData>("/zones/detect", &query).await {
            Ok(data) => Ok(data.zone),
            Err(GatewayError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let gw = HttpGateway::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(gw.url("/orders"), "http://localhost:5000/api/orders");
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_unreachable());
        assert!(GatewayError::Network("refused".into()).is_unreachable());
        assert!(!GatewayError::NotFound.is_unreachable());
        assert!(
            !GatewayError::Rejected {
                status: 400,
                message: "bad".into()
            }
            .is_unreachable()
        );
    }
}
