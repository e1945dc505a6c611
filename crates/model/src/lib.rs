//! Domain types shared by the cart, pricing and checkout crates.
//!
//! Monetary amounts are [`Decimal`] so that computations keep full precision
//! until they are rounded for display. Every type serialises to the camelCase
//! JSON the storefront backend speaks; the request/response envelopes live in
//! [`api`].

pub mod api;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// One product selected for purchase.
///
/// `quantity` is always at least 1 while the item is in a cart; removal is
/// the only way to go below that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_veg: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    /// Restaurant display name.
    pub restaurant: String,
    /// Canonical restaurant identifier; identical across the whole cart.
    pub restaurant_id: String,
}

impl CartItem {
    /// Unit price multiplied by quantity.
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Amount saved against `original_price`, zero when there is no markdown.
    pub fn markdown_savings(&self) -> Decimal {
        match self.original_price {
            Some(original) if original > self.price => {
                (original - self.price) * Decimal::from(self.quantity)
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Sum of line totals at current unit prices.
pub fn subtotal(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

/// A product about to be added to the cart. Quantity starts at 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_veg: bool,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub restaurant: String,
    pub restaurant_id: String,
}

impl NewCartItem {
    /// Turns the draft into a cart line with the given quantity.
    pub fn into_item(self, quantity: u32) -> CartItem {
        CartItem {
            id: self.id,
            name: self.name,
            price: self.price,
            quantity,
            image: self.image,
            description: self.description,
            is_veg: self.is_veg,
            original_price: self.original_price,
            restaurant: self.restaurant,
            restaurant_id: self.restaurant_id,
        }
    }
}

/// Screen anchor a cart mutation originated from. Presentation metadata only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SourcePosition {
    pub x: f64,
    pub y: f64,
}

/// Product details attached to a removal or quantity change for presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Coupon offered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Case-sensitive code matched by the backend.
    pub code: String,
    /// Absolute amount saved.
    pub discount: Decimal,
    /// Subtotal below which the coupon cannot be applied.
    #[serde(default)]
    pub min_order: Decimal,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
}

impl Coupon {
    /// Whether `subtotal` reaches the coupon's minimum order.
    pub fn is_eligible(&self, subtotal: Decimal) -> bool {
        subtotal >= self.min_order
    }
}

/// Totals for a cart, as computed by the pricing service or estimated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub platform_fee: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub savings: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_coupon: Option<String>,
}

impl PricingBreakdown {
    /// Copy with every amount rounded to whole currency units for display.
    pub fn rounded(&self) -> Self {
        let round = |v: Decimal| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal: round(self.subtotal),
            delivery_fee: round(self.delivery_fee),
            platform_fee: round(self.platform_fee),
            tax: round(self.tax),
            discount: round(self.discount),
            total: round(self.total),
            savings: round(self.savings),
            applied_coupon: self.applied_coupon.clone(),
        }
    }
}

/// Pricing together with the guarantee it carries.
///
/// `Server` is authoritative. `LocalEstimate` only keeps the display going
/// while the pricing service is unreachable and is never submitted with an
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pricing {
    Server(PricingBreakdown),
    LocalEstimate(PricingBreakdown),
}

impl Pricing {
    pub fn breakdown(&self) -> &PricingBreakdown {
        match self {
            Pricing::Server(b) | Pricing::LocalEstimate(b) => b,
        }
    }

    pub fn total(&self) -> Decimal {
        self.breakdown().total
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self, Pricing::Server(_))
    }
}

/// Fee schedule used for the local estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeSettings {
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Decimal,
    pub platform_fee: Decimal,
    /// Tax as a percentage of the subtotal (5 means 5%).
    pub gst_rate: Decimal,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            delivery_fee: Decimal::from(40),
            free_delivery_threshold: Decimal::from(500),
            platform_fee: Decimal::from(5),
            gst_rate: Decimal::from(5),
        }
    }
}

/// Delivery address as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub full_address: String,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl DeliveryAddress {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Delivery-service tier for an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFleet {
    #[default]
    Standard,
    /// Vegetarian-only courier pool.
    PureVeg,
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(rename = "cod")]
    CashOnDelivery,
    /// Stored balance.
    Wallet,
    /// Online gateway.
    Razorpay,
}

impl PaymentMethod {
    pub fn is_online(self) -> bool {
        matches!(self, PaymentMethod::Razorpay)
    }
}

/// Restaurant as confirmed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Geofenced service area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
