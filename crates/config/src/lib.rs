use anyhow::{Context, Result};
use model::FeeSettings;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables read by [`AppConfig::load`].
pub const ENV_PREFIX: &str = "CHECKOUT";

/// `AppConfig` holds all configuration parameters required by the checkout client.
///
/// The configuration is loaded from environment variables (optionally via a `.env` file)
/// or uses default values if the variable is not set. Variables carry the `CHECKOUT_`
/// prefix, e.g. `CHECKOUT_API_BASE_URL`. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Backend ---
    /// Root URL of the storefront REST API, without a trailing slash.
    pub api_base_url: String,
    /// Bearer token attached to every request, if the user is signed in.
    pub auth_token: Option<String>,
    /// Per-request timeout (human-friendly format, e.g. "10s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    // --- Local state ---
    /// File the cart is persisted to between runs.
    pub cart_storage_path: String,
    /// How long a zone lookup stays cached.
    #[serde(deserialize_with = "deserialize_duration")]
    pub zone_cache_ttl: Duration,

    // --- Fallback fee schedule ---
    /// Delivery fee used by the local estimate.
    pub fallback_delivery_fee: Decimal,
    /// Subtotal above which the local estimate waives delivery.
    pub fallback_free_delivery_threshold: Decimal,
    /// Flat platform fee used by the local estimate.
    pub fallback_platform_fee: Decimal,
    /// Tax percentage used by the local estimate.
    pub fallback_gst_rate: Decimal,
}

/// Custom deserializer for durations.
/// Accepts human-readable formats like "5s", "1m", etc.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing required values.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::builder()?
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Configuration made of defaults only, ignoring the environment.
    ///
    /// # Errors
    /// Returns an error if the defaults fail to deserialize.
    pub fn defaults() -> Result<Self> {
        Self::builder()?
            .build()?
            .try_deserialize()
            .context("Failed to build default configuration")
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            // Backend
            .set_default("api_base_url", "http://localhost:5000/api")?
            .set_default("request_timeout", "10s")?
            // Local state
            .set_default("cart_storage_path", ".cart.json")?
            .set_default("zone_cache_ttl", "10m")?
            // Fallback fee schedule
            .set_default("fallback_delivery_fee", "40")?
            .set_default("fallback_free_delivery_threshold", "500")?
            .set_default("fallback_platform_fee", "5")?
            .set_default("fallback_gst_rate", "5")?;
        Ok(builder)
    }

    /// Fee schedule the pricing reconciler starts from.
    pub fn fallback_fees(&self) -> FeeSettings {
        FeeSettings {
            delivery_fee: self.fallback_delivery_fee,
            free_delivery_threshold: self.fallback_free_delivery_threshold,
            platform_fee: self.fallback_platform_fee,
            gst_rate: self.fallback_gst_rate,
        }
    }
}
