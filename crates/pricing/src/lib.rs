//! Pricing reconciler.
//!
//! Keeps the displayed totals in line with the pricing service. Every
//! recalculation replaces the previous result wholesale; when the service is
//! unreachable a [`Pricing::LocalEstimate`] is computed from the cached fee
//! schedule instead. Only the newest recalculation may publish its result.

mod estimate;

pub use estimate::estimate;

use std::sync::atomic::{AtomicU64, Ordering};

use gateway::{GatewayError, PricingGateway};
use model::api::{PricingItem, PricingRequest};
use model::{CartItem, Coupon, DeliveryAddress, DeliveryFleet, FeeSettings, Pricing};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// The cart subtotal is below the coupon's minimum order.
    #[error("Add items worth {shortfall} more to use {code} (minimum order {min_order})")]
    CouponBelowMinimum {
        code: String,
        min_order: Decimal,
        subtotal: Decimal,
        shortfall: Decimal,
    },
}

/// Outcome of one recalculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recalculation {
    /// This result is now the current pricing. `None` means no pricing is shown.
    Updated(Option<Pricing>),
    /// A newer recalculation started before this one finished; its result was dropped.
    Superseded,
}

/// Recomputes pricing whenever the cart, address, coupon or fleet change.
pub struct PricingReconciler<G> {
    gateway: G,
    fees: RwLock<FeeSettings>,
    coupon: RwLock<Option<Coupon>>,
    current: RwLock<Option<Pricing>>,
    latest: AtomicU64,
}

impl<G> std::fmt::Debug for PricingReconciler<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingReconciler")
            .field("latest", &self.latest.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<G: PricingGateway> PricingReconciler<G> {
    /// `fees` seeds the local estimate until [`Self::refresh_fee_settings`] succeeds.
    pub fn new(gateway: G, fees: FeeSettings) -> Self {
        Self {
            gateway,
            fees: RwLock::new(fees),
            coupon: RwLock::new(None),
            current: RwLock::new(None),
            latest: AtomicU64::new(0),
        }
    }

    /// Current pricing, if any.
    pub async fn current(&self) -> Option<Pricing> {
        self.current.read().await.clone()
    }

    pub async fn applied_coupon(&self) -> Option<Coupon> {
        self.coupon.read().await.clone()
    }

    pub async fn fee_settings(&self) -> FeeSettings {
        self.fees.read().await.clone()
    }

    /// Replace the cached fee schedule with the backend's. Keeps the cached
    /// one when the call fails.
    pub async fn refresh_fee_settings(&self) -> bool {
        match self.gateway.fee_settings().await {
            Ok(fees) => {
                debug!(?fees, "Fee settings refreshed");
                *self.fees.write().await = fees;
                true
            }
            Err(e) => {
                warn!("Keeping cached fee settings: {e}");
                false
            }
        }
    }

    /// Recompute pricing for `cart`.
    ///
    /// An empty cart or a missing address clears the pricing without calling
    /// the service. A "not found" answer means no pricing is available; any
    /// other failure falls back to a local estimate.
    #[instrument(skip_all, fields(items = cart.len()))]
    pub async fn calculate_pricing(
        &self,
        cart: &[CartItem],
        address: Option<&DeliveryAddress>,
        fleet: DeliveryFleet,
    ) -> Recalculation {
        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let (Some(address), Some(first)) = (address, cart.first()) else {
            return self.publish(token, None).await;
        };

        let coupon = self.revalidate_coupon(model::subtotal(cart)).await;
        let request = build_request(cart, &first.restaurant_id, address, coupon.as_ref(), fleet);

        let pricing = match self.gateway.calculate_pricing(&request).await {
            Ok(breakdown) => Some(Pricing::Server(breakdown)),
            Err(GatewayError::NotFound) => {
                info!("No pricing available for this cart");
                None
            }
            Err(e) => {
                warn!("Pricing service failed, showing local estimate: {e}");
                let fees = self.fees.read().await.clone();
                Some(Pricing::LocalEstimate(estimate(cart, &fees, coupon.as_ref())))
            }
        };

        self.publish(token, pricing).await
    }

    /// Apply `coupon` and recalculate.
    ///
    /// # Errors
    /// [`PricingError::CouponBelowMinimum`] when the cart subtotal is below the
    /// coupon's minimum order; the applied coupon is left as it was.
    pub async fn apply_coupon(
        &self,
        coupon: Coupon,
        cart: &[CartItem],
        address: Option<&DeliveryAddress>,
        fleet: DeliveryFleet,
    ) -> Result<Recalculation, PricingError> {
        let subtotal = model::subtotal(cart);
        if !coupon.is_eligible(subtotal) {
            return Err(PricingError::CouponBelowMinimum {
                code: coupon.code,
                min_order: coupon.min_order,
                subtotal,
                shortfall: coupon.min_order - subtotal,
            });
        }
        info!(code = %coupon.code, "Coupon applied");
        *self.coupon.write().await = Some(coupon);
        Ok(self.calculate_pricing(cart, address, fleet).await)
    }

    /// Drop the applied coupon and recalculate.
    pub async fn remove_coupon(
        &self,
        cart: &[CartItem],
        address: Option<&DeliveryAddress>,
        fleet: DeliveryFleet,
    ) -> Recalculation {
        if let Some(old) = self.coupon.write().await.take() {
            info!(code = %old.code, "Coupon removed");
        }
        self.calculate_pricing(cart, address, fleet).await
    }

    /// Fresh server pricing for submitting an order to `restaurant_id`.
    ///
    /// Unlike [`Self::calculate_pricing`] this never falls back to an
    /// estimate: the gateway error is returned instead. A successful quote
    /// also becomes the current pricing.
    ///
    /// # Errors
    /// Whatever the pricing service call failed with.
    #[instrument(skip(self, cart, address), fields(items = cart.len()))]
    pub async fn quote_for_order(
        &self,
        cart: &[CartItem],
        restaurant_id: &str,
        address: &DeliveryAddress,
        fleet: DeliveryFleet,
    ) -> Result<Pricing, GatewayError> {
        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let coupon = self.revalidate_coupon(model::subtotal(cart)).await;
        let request = build_request(cart, restaurant_id, address, coupon.as_ref(), fleet);

        let pricing = Pricing::Server(self.gateway.calculate_pricing(&request).await?);
        self.publish(token, Some(pricing.clone())).await;
        Ok(pricing)
    }

    /// The applied coupon if the subtotal still reaches its minimum order;
    /// otherwise the coupon is dropped.
    async fn revalidate_coupon(&self, subtotal: Decimal) -> Option<Coupon> {
        let mut applied = self.coupon.write().await;
        if applied.as_ref().is_none_or(|c| c.is_eligible(subtotal)) {
            return applied.clone();
        }
        if let Some(c) = applied.take() {
            info!(code = %c.code, %subtotal, min_order = %c.min_order, "Coupon no longer eligible, removing");
        }
        None
    }

    async fn publish(&self, token: u64, pricing: Option<Pricing>) -> Recalculation {
        let mut current = self.current.write().await;
        if self.latest.load(Ordering::SeqCst) != token {
            debug!(token, "Discarding superseded pricing result");
            return Recalculation::Superseded;
        }
        *current = pricing.clone();
        Recalculation::Updated(pricing)
    }
}

fn build_request(
    cart: &[CartItem],
    restaurant_id: &str,
    address: &DeliveryAddress,
    coupon: Option<&Coupon>,
    fleet: DeliveryFleet,
) -> PricingRequest {
    PricingRequest {
        items: cart.iter().map(PricingItem::from).collect(),
        restaurant_id: restaurant_id.to_string(),
        delivery_address: address.clone(),
        coupon_code: coupon.map(|c| c.code.clone()),
        delivery_fleet: fleet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::PricingBreakdown;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    type Scripted = (Duration, Result<PricingBreakdown, GatewayError>);

    /// Pricing service answering from a script, one entry per call.
    #[derive(Default)]
    struct ScriptedGateway {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<PricingRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn with(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PricingGateway for ScriptedGateway {
        async fn calculate_pricing(
            &self,
            request: &PricingRequest,
        ) -> Result<PricingBreakdown, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let (delay, result) = next.unwrap_or((Duration::ZERO, Err(GatewayError::NotFound)));
            tokio::time::sleep(delay).await;
            result
        }

        async fn fee_settings(&self) -> Result<FeeSettings, GatewayError> {
            Ok(FeeSettings {
                delivery_fee: Decimal::from(25),
                ..FeeSettings::default()
            })
        }
    }

    fn item(id: &str, price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: id.into(),
            name: "Dish".into(),
            price: Decimal::from(price),
            quantity,
            image: None,
            description: None,
            is_veg: true,
            original_price: None,
            restaurant: "Pizza Place".into(),
            restaurant_id: "r1".into(),
        }
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            full_address: "12 MG Road".into(),
            ..Default::default()
        }
    }

    fn server_total(total: i64) -> Result<PricingBreakdown, GatewayError> {
        Ok(PricingBreakdown {
            total: Decimal::from(total),
            ..Default::default()
        })
    }

    fn coupon(min_order: i64) -> Coupon {
        Coupon {
            code: "SAVE20".into(),
            discount: Decimal::from(20),
            min_order: Decimal::from(min_order),
            item_id: None,
            item_name: None,
        }
    }

    #[tokio::test]
    async fn test_server_total_is_authoritative() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, server_total(999))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());

        let cart = [item("p1", 100, 2)];
        let outcome = reconciler
            .calculate_pricing(&cart, Some(&address()), DeliveryFleet::Standard)
            .await;
        let Recalculation::Updated(Some(pricing)) = outcome else {
            panic!("expected pricing, got {outcome:?}");
        };
        assert!(pricing.is_authoritative());
        assert_eq!(pricing.total(), Decimal::from(999));
        assert_eq!(reconciler.current().await, Some(pricing));
    }

    #[tokio::test]
    async fn test_empty_cart_or_missing_address_clears_pricing() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, server_total(255))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let cart = [item("p1", 100, 2)];
        reconciler
            .calculate_pricing(&cart, Some(&address()), DeliveryFleet::Standard)
            .await;
        assert!(reconciler.current().await.is_some());

        let outcome = reconciler.calculate_pricing(&cart, None, DeliveryFleet::Standard).await;
        assert_eq!(outcome, Recalculation::Updated(None));
        let outcome = reconciler
            .calculate_pricing(&[], Some(&address()), DeliveryFleet::Standard)
            .await;
        assert_eq!(outcome, Recalculation::Updated(None));
        assert!(reconciler.current().await.is_none());
        assert_eq!(reconciler.gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_failure_falls_back_to_estimate() {
        let gw = ScriptedGateway::with(vec![(
            Duration::ZERO,
            Err(GatewayError::Network("connection refused".into())),
        )]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());

        let outcome = reconciler
            .calculate_pricing(&[item("p1", 100, 2)], Some(&address()), DeliveryFleet::Standard)
            .await;
        let Recalculation::Updated(Some(Pricing::LocalEstimate(b))) = outcome else {
            panic!("expected local estimate, got {outcome:?}");
        };
        assert_eq!(b.total, Decimal::from(255));
    }

    #[tokio::test]
    async fn test_not_found_means_no_pricing() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, Err(GatewayError::NotFound))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let outcome = reconciler
            .calculate_pricing(&[item("p1", 100, 1)], Some(&address()), DeliveryFleet::Standard)
            .await;
        assert_eq!(outcome, Recalculation::Updated(None));
    }

    #[tokio::test]
    async fn test_stale_response_does_not_overwrite_newer() {
        let gw = ScriptedGateway::with(vec![
            (Duration::from_millis(200), server_total(100)),
            (Duration::from_millis(10), server_total(200)),
        ]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let cart = [item("p1", 100, 1)];
        let addr = address();

        let (slow, fast) = tokio::join!(
            reconciler.calculate_pricing(&cart, Some(&addr), DeliveryFleet::Standard),
            reconciler.calculate_pricing(&cart, Some(&addr), DeliveryFleet::Standard),
        );
        assert_eq!(slow, Recalculation::Superseded);
        assert!(matches!(fast, Recalculation::Updated(Some(_))));
        assert_eq!(reconciler.current().await.unwrap().total(), Decimal::from(200));
    }

    #[tokio::test]
    async fn test_coupon_gated_by_minimum_order() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, server_total(216))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let addr = address();

        let small = [item("p1", 150, 1)];
        let err = reconciler
            .apply_coupon(coupon(200), &small, Some(&addr), DeliveryFleet::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::CouponBelowMinimum { .. }));
        assert_eq!(err.to_string(), "Add items worth 50 more to use SAVE20 (minimum order 200)");
        assert!(reconciler.applied_coupon().await.is_none());
        assert_eq!(reconciler.gateway.calls.load(Ordering::SeqCst), 0);

        let bigger = [item("p1", 150, 1), item("p2", 70, 1)];
        reconciler
            .apply_coupon(coupon(200), &bigger, Some(&addr), DeliveryFleet::Standard)
            .await
            .unwrap();
        assert_eq!(reconciler.applied_coupon().await.unwrap().code, "SAVE20");
        let sent = reconciler.gateway.requests.lock().unwrap()[0].clone();
        assert_eq!(sent.coupon_code.as_deref(), Some("SAVE20"));
    }

    #[tokio::test]
    async fn test_coupon_dropped_when_subtotal_falls() {
        let gw = ScriptedGateway::with(vec![
            (Duration::ZERO, server_total(216)),
            (Duration::ZERO, server_total(160)),
        ]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let addr = address();

        let cart = [item("p1", 150, 1), item("p2", 70, 1)];
        reconciler
            .apply_coupon(coupon(200), &cart, Some(&addr), DeliveryFleet::Standard)
            .await
            .unwrap();

        reconciler
            .calculate_pricing(&cart[..1], Some(&addr), DeliveryFleet::Standard)
            .await;
        assert!(reconciler.applied_coupon().await.is_none());
        let sent = reconciler.gateway.requests.lock().unwrap()[1].clone();
        assert!(sent.coupon_code.is_none());
    }

    #[tokio::test]
    async fn test_remove_coupon_recalculates_without_code() {
        let gw = ScriptedGateway::with(vec![
            (Duration::ZERO, server_total(216)),
            (Duration::ZERO, server_total(236)),
        ]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let addr = address();
        let cart = [item("p1", 220, 1)];

        reconciler
            .apply_coupon(coupon(200), &cart, Some(&addr), DeliveryFleet::Standard)
            .await
            .unwrap();
        let outcome = reconciler
            .remove_coupon(&cart, Some(&addr), DeliveryFleet::Standard)
            .await;
        assert!(matches!(outcome, Recalculation::Updated(Some(ref p)) if p.total() == Decimal::from(236)));
        assert!(reconciler.applied_coupon().await.is_none());
    }

    #[tokio::test]
    async fn test_quote_for_order_never_estimates() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, Err(GatewayError::Timeout(Duration::from_secs(10))))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let err = reconciler
            .quote_for_order(&[item("p1", 100, 1)], "r1", &address(), DeliveryFleet::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        assert!(reconciler.current().await.is_none());
    }

    #[tokio::test]
    async fn test_quote_uses_given_restaurant_id() {
        let gw = ScriptedGateway::with(vec![(Duration::ZERO, server_total(120))]);
        let reconciler = PricingReconciler::new(gw, FeeSettings::default());
        let quote = reconciler
            .quote_for_order(&[item("p1", 100, 1)], "64af01", &address(), DeliveryFleet::PureVeg)
            .await
            .unwrap();
        assert!(quote.is_authoritative());
        let sent = reconciler.gateway.requests.lock().unwrap()[0].clone();
        assert_eq!(sent.restaurant_id, "64af01");
        assert_eq!(sent.delivery_fleet, DeliveryFleet::PureVeg);
        assert_eq!(reconciler.current().await, Some(quote));
    }

    #[tokio::test]
    async fn test_refresh_fee_settings() {
        let reconciler = PricingReconciler::new(ScriptedGateway::default(), FeeSettings::default());
        assert!(reconciler.refresh_fee_settings().await);
        assert_eq!(reconciler.fee_settings().await.delivery_fee, Decimal::from(25));
    }
}
