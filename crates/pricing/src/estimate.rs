//! Local price estimate used while the pricing service is unreachable.

use model::{CartItem, Coupon, FeeSettings, PricingBreakdown};
use rust_decimal::Decimal;

/// Estimate totals for `items` from the cached fee schedule.
///
/// Delivery is free once the subtotal exceeds the threshold; the coupon
/// discount is capped at half the subtotal and only counts when the coupon's
/// minimum order is met.
pub fn estimate(items: &[CartItem], fees: &FeeSettings, coupon: Option<&Coupon>) -> PricingBreakdown {
    let subtotal = model::subtotal(items);
    let delivery_fee = if subtotal > fees.free_delivery_threshold {
        Decimal::ZERO
    } else {
        fees.delivery_fee
    };
    let platform_fee = fees.platform_fee;
    let tax = subtotal * fees.gst_rate / Decimal::ONE_HUNDRED;

    let eligible = coupon.filter(|c| c.is_eligible(subtotal));
    let discount = eligible
        .map(|c| c.discount.min(subtotal / Decimal::TWO))
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);

    let total = (subtotal + delivery_fee + platform_fee + tax - discount).max(Decimal::ZERO);
    let markdown: Decimal = items.iter().map(CartItem::markdown_savings).sum();

    PricingBreakdown {
        subtotal,
        delivery_fee,
        platform_fee,
        tax,
        discount,
        total,
        savings: discount + markdown,
        applied_coupon: eligible.map(|c| c.code.clone()),
    }
}
