use std::sync::Arc;

use anyhow::{Context as _, Result};
use app_config::AppConfig;
use cart::{CartStore, JsonFileStorage};
use gateway::HttpGateway;
use pricing::PricingReconciler;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Everything a command needs, wired from configuration.
pub(crate) struct Context {
    pub config: AppConfig,
    pub gateway: HttpGateway,
    pub cart: Arc<CartStore>,
    pub pricing: Arc<PricingReconciler<HttpGateway>>,
}

impl Context {
    pub async fn init(config: AppConfig) -> Result<Self> {
        let mut gateway = HttpGateway::new(&config.api_base_url, config.request_timeout)
            .context("Failed to create backend client")?;
        if let Some(token) = &config.auth_token {
            gateway = gateway.with_auth_token(token.clone());
        }

        let storage = Arc::new(JsonFileStorage::new(&config.cart_storage_path));
        let cart = Arc::new(CartStore::open(storage).await);
        info!(items = cart.cart_count().await, path = %config.cart_storage_path, "Cart restored");

        let mut events = cart.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => debug!(
                        kind = ?event.kind,
                        item = ?event.item_id,
                        before = event.before,
                        after = event.after,
                        "Cart changed"
                    ),
                    Err(RecvError::Lagged(missed)) => debug!(missed, "Cart event log fell behind"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let pricing = Arc::new(PricingReconciler::new(gateway.clone(), config.fallback_fees()));

        Ok(Self {
            config,
            gateway,
            cart,
            pricing,
        })
    }
}
