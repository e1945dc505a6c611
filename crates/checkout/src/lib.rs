//! Order assembly and checkout.
//!
//! [`OrderAssembler`] is the last check before an order leaves the client.
//! Each attempt runs validation again from scratch, submits the order with a
//! fresh server quote, and for online payments drives the gateway flow and
//! verifies the result with the backend. Progress is published as a
//! [`CheckoutState`] on a `watch` channel.
//!
//! # Features
//! - Restaurant identity resolution and repair of mixed-restaurant carts.
//! - Stored-balance check before submission.
//! - At most one attempt in flight per assembler.
//! - Failure classes with distinct messages and recovery hints via [`CheckoutError`].

mod error;
mod payment;
pub mod restaurant;
mod zone;

pub use error::{CheckoutError, Recovery, ValidationError};
pub use payment::{PaymentFlow, PaymentOutcome, PaymentReceipt};
pub use restaurant::{IdentitySource, RestaurantIdentity};
pub use zone::ZoneResolver;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cart::CartStore;
use gateway::{GatewayError, OrderGateway, PricingGateway, WalletGateway};
use model::api::{OrderItem, OrderRequest, PaymentVerification, PlacedOrder};
use model::{
    CartItem, DeliveryAddress, DeliveryFleet, PaymentMethod, PricingBreakdown, RestaurantRecord,
};
use pricing::PricingReconciler;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Where a checkout attempt stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    Validating,
    Submitting,
    /// Waiting on the customer in the payment gateway.
    AwaitingPayment,
    Verifying,
    Completed { order_id: String },
    ValidationFailed,
    SubmissionFailed,
    PaymentFailed,
    VerificationFailed,
}

impl CheckoutState {
    /// True while an attempt is running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            CheckoutState::Validating
                | CheckoutState::Submitting
                | CheckoutState::AwaitingPayment
                | CheckoutState::Verifying
        )
    }

    /// The failure state reached when an attempt fails while in `self`.
    fn failed(&self) -> CheckoutState {
        match self {
            CheckoutState::Submitting => CheckoutState::SubmissionFailed,
            CheckoutState::AwaitingPayment => CheckoutState::PaymentFailed,
            CheckoutState::Verifying => CheckoutState::VerificationFailed,
            _ => CheckoutState::ValidationFailed,
        }
    }
}

/// Customer choices for one checkout attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub address: Option<DeliveryAddress>,
    /// Restaurant as confirmed by the backend, when the caller has it.
    pub restaurant: Option<RestaurantRecord>,
    pub payment_method: PaymentMethod,
    pub fleet: DeliveryFleet,
    pub note: Option<String>,
    pub send_cutlery: bool,
    pub zone_id: Option<String>,
}

/// Trait describing order placement.
#[async_trait]
pub trait OrderPlacement: Send + Sync {
    /// Validates the cart, submits the order and settles payment.
    ///
    /// The cart is cleared only once the order is placed and, for online
    /// payments, verified.
    ///
    /// # Errors
    /// See [`CheckoutError`]; [`CheckoutError::AlreadyInFlight`] when another
    /// attempt has not finished yet.
    async fn place_order(&self, request: &CheckoutRequest) -> Result<PlacedOrder, CheckoutError>;

    fn state(&self) -> CheckoutState;
}

/// Cart contents that passed validation, with the quote to submit.
struct Validated {
    address: DeliveryAddress,
    items: Vec<CartItem>,
    restaurant: RestaurantIdentity,
    pricing: PricingBreakdown,
}

/// Checkout state machine over the cart, the pricing reconciler and the
/// order, wallet and payment collaborators.
pub struct OrderAssembler<P, O, W, F> {
    cart: Arc<CartStore>,
    pricing: Arc<PricingReconciler<P>>,
    orders: O,
    wallet: W,
    payments: F,
    state: watch::Sender<CheckoutState>,
    in_flight: AtomicBool,
}

impl<P, O, W, F> std::fmt::Debug for OrderAssembler<P, O, W, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderAssembler")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<P, O, W, F> OrderAssembler<P, O, W, F>
where
    P: PricingGateway,
    O: OrderGateway,
    W: WalletGateway,
    F: PaymentFlow,
{
    pub fn new(
        cart: Arc<CartStore>,
        pricing: Arc<PricingReconciler<P>>,
        orders: O,
        wallet: W,
        payments: F,
    ) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            cart,
            pricing,
            orders,
            wallet,
            payments,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: CheckoutState) {
        self.state.send_replace(next);
    }

    async fn run(&self, request: &CheckoutRequest) -> Result<PlacedOrder, CheckoutError> {
        self.set_state(CheckoutState::Validating);
        let checked = self.validate(request).await?;

        self.set_state(CheckoutState::Submitting);
        let payload = OrderRequest {
            items: checked.items.iter().map(OrderItem::from).collect(),
            address: checked.address,
            restaurant_id: checked.restaurant.id,
            restaurant_name: checked.restaurant.name,
            pricing: checked.pricing,
            delivery_fleet: request.fleet,
            note: request.note.clone(),
            send_cutlery: request.send_cutlery,
            payment_method: request.payment_method,
            zone_id: request.zone_id.clone(),
        };
        let created = self.orders.create_order(&payload).await?;
        info!(order_id = %created.order.order_id, method = ?request.payment_method, "Order created");

        if !request.payment_method.is_online() {
            self.cart.clear_cart().await;
            return Ok(created.order);
        }

        self.set_state(CheckoutState::AwaitingPayment);
        let Some(handle) = created.razorpay else {
            warn!(order_id = %created.order.order_id, "No payment handle returned");
            return Err(CheckoutError::PaymentFailed(
                "the payment gateway could not be opened".into(),
            ));
        };
        let receipt = match self.payments.collect(&handle, &created.order).await {
            PaymentOutcome::Authorized(receipt) => receipt,
            PaymentOutcome::Cancelled => {
                info!(order_id = %created.order.order_id, "Payment cancelled");
                return Err(CheckoutError::PaymentCancelled);
            }
            PaymentOutcome::Failed(reason) => {
                warn!(order_id = %created.order.order_id, %reason, "Payment failed");
                return Err(CheckoutError::PaymentFailed(reason));
            }
        };

        self.set_state(CheckoutState::Verifying);
        let verification = PaymentVerification {
            order_id: created.order.id.clone(),
            razorpay_order_id: receipt.gateway_order_id,
            razorpay_payment_id: receipt.payment_id,
            razorpay_signature: receipt.signature,
        };
        if let Err(e) = self.orders.verify_payment(&verification).await {
            error!(order_id = %created.order.order_id, "Payment verification failed: {e}");
            return Err(CheckoutError::PaymentVerificationFailed {
                order_id: created.order.order_id,
                reason: e.to_string(),
            });
        }

        info!(order_id = %created.order.order_id, "Payment verified");
        self.cart.clear_cart().await;
        Ok(created.order)
    }

    async fn validate(&self, request: &CheckoutRequest) -> Result<Validated, CheckoutError> {
        let address = request
            .address
            .clone()
            .ok_or(ValidationError::MissingAddress)?;
        let items = self.cart.items().await;
        if items.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let identity = restaurant::resolve(request.restaurant.as_ref(), &items)
            .ok_or(ValidationError::UnknownRestaurant)?;

        let items = self.repair_mixed_cart(&identity, items).await?;
        if restaurant::distinct_ids(&items) > 1 {
            warn!(restaurant = %identity.name, "Cart items use different ids for the same restaurant");
        }

        if items.iter().any(|i| !identity.owns(i)) {
            return Err(ValidationError::StaleCart {
                restaurant: identity.name,
            }
            .into());
        }

        let quote = match self
            .pricing
            .quote_for_order(&items, &identity.id, &address, request.fleet)
            .await
        {
            Ok(quote) => quote,
            Err(GatewayError::NotFound) => return Err(ValidationError::PricingUnavailable.into()),
            Err(e) => return Err(e.into()),
        };
        let pricing = quote.breakdown().clone();

        if request.payment_method == PaymentMethod::Wallet {
            let balance = self.wallet.wallet_balance().await?;
            if balance < pricing.total {
                return Err(ValidationError::InsufficientBalance {
                    balance,
                    total: pricing.total,
                    shortfall: pricing.total - balance,
                }
                .into());
            }
        }

        Ok(Validated {
            address,
            items,
            restaurant: identity,
            pricing,
        })
    }

    /// Cleans a cart holding several restaurants down to one.
    ///
    /// Keeps every item the resolved restaurant owns, whatever id format it
    /// carries, or the first restaurant in the cart when none belong to it.
    /// Anything removed aborts the attempt. Names that still disagree after
    /// the cleanup are a stale cart.
    async fn repair_mixed_cart(
        &self,
        identity: &RestaurantIdentity,
        items: Vec<CartItem>,
    ) -> Result<Vec<CartItem>, CheckoutError> {
        if restaurant::distinct_names(&items) <= 1 {
            return Ok(items);
        }

        let keep = match items.first() {
            Some(first) if !items.iter().any(|i| identity.owns(i)) => RestaurantIdentity {
                id: first.restaurant_id.clone(),
                name: first.restaurant.clone(),
                source: IdentitySource::CartItem,
            },
            _ => identity.clone(),
        };
        let removed = self.cart.clean_cart_where(|i| keep.owns(i)).await;
        if removed > 0 {
            warn!(kept = %keep.name, removed, "Cart held several restaurants, aborting checkout");
            return Err(CheckoutError::RestaurantMismatch {
                kept: keep.name,
                removed,
            });
        }

        warn!(restaurant_id = %keep.id, "Cart items share an id under different names");
        Err(ValidationError::StaleCart {
            restaurant: identity.name.clone(),
        }
        .into())
    }
}

#[async_trait]
impl<P, O, W, F> OrderPlacement for OrderAssembler<P, O, W, F>
where
    P: PricingGateway,
    O: OrderGateway,
    W: WalletGateway,
    F: PaymentFlow,
{
    #[instrument(skip(self, request), fields(method = ?request.payment_method))]
    async fn place_order(&self, request: &CheckoutRequest) -> Result<PlacedOrder, CheckoutError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!("Ignoring place order while another attempt is running");
            return Err(CheckoutError::AlreadyInFlight);
        };

        let result = self.run(request).await;
        let next = match &result {
            Ok(order) => CheckoutState::Completed {
                order_id: order.order_id.clone(),
            },
            Err(CheckoutError::PaymentCancelled) => CheckoutState::Idle,
            Err(e) => {
                let failed = self.state.borrow().failed();
                info!(state = ?failed, recovery = ?e.recovery(), "Checkout failed: {e}");
                failed
            }
        };
        self.set_state(next);
        result
    }

    fn state(&self) -> CheckoutState {
        self.state.borrow().clone()
    }
}

/// Holds the in-flight flag for the duration of one attempt.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
