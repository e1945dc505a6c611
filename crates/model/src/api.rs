//! JSON request and response shapes exchanged with the storefront backend.
//!
//! Every response is wrapped in an [`ApiResponse`] envelope.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    CartItem, DeliveryAddress, DeliveryFleet, PaymentMethod, PricingBreakdown, Zone,
};

/// `{ success, message?, data? }` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Item as sent to the pricing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PricingItem {
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub image: Option<String>,
    pub description: Option<String>,
    pub is_veg: bool,
}

impl From<&CartItem> for PricingItem {
    fn from(item: &CartItem) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
            image: item.image.clone(),
            description: item.description.clone(),
            is_veg: item.is_veg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricingRequest {
    pub items: Vec<PricingItem>,
    pub restaurant_id: String,
    pub delivery_address: DeliveryAddress,
    pub coupon_code: Option<String>,
    pub delivery_fleet: DeliveryFleet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingData {
    pub pricing: PricingBreakdown,
}

/// Order line as sent to the order-creation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub is_veg: bool,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
            is_veg: item.is_veg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    pub address: DeliveryAddress,
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub pricing: PricingBreakdown,
    pub delivery_fleet: DeliveryFleet,
    pub note: Option<String>,
    pub send_cutlery: bool,
    pub payment_method: PaymentMethod,
    pub zone_id: Option<String>,
}

/// Identifiers of a freshly created order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: String,
    /// Human-facing order number.
    pub order_id: String,
}

/// Handle for collecting an online payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub order_id: String,
    /// Amount in the gateway's minor unit.
    pub amount: i64,
    pub currency: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order: PlacedOrder,
    #[serde(default)]
    pub razorpay: Option<GatewayOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub order_id: String,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletData {
    pub wallet: Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneData {
    #[serde(default)]
    pub zone: Option<Zone>,
}
