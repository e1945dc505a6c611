use anyhow::Result;
use checkout::{CheckoutRequest, OrderAssembler, OrderPlacement, ZoneResolver};
use clap::{Args, ValueEnum};
use model::{PaymentMethod, RestaurantRecord};
use tracing::{info, warn};

use super::{CouponArgs, DeliveryArgs};
use crate::context::Context;
use crate::payment::StdinPaymentFlow;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Payment {
    Cod,
    Wallet,
    Razorpay,
}

impl From<Payment> for PaymentMethod {
    fn from(payment: Payment) -> Self {
        match payment {
            Payment::Cod => PaymentMethod::CashOnDelivery,
            Payment::Wallet => PaymentMethod::Wallet,
            Payment::Razorpay => PaymentMethod::Razorpay,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    #[command(flatten)]
    delivery: DeliveryArgs,

    #[command(flatten)]
    coupon: CouponArgs,

    #[arg(long, value_enum, default_value = "cod")]
    payment: Payment,

    /// Restaurant id as confirmed by the backend
    #[arg(long)]
    restaurant_id: Option<String>,

    /// Restaurant name as confirmed by the backend
    #[arg(long)]
    restaurant_name: Option<String>,

    /// Note for the restaurant
    #[arg(long)]
    note: Option<String>,

    #[arg(long)]
    no_cutlery: bool,
}

pub(crate) async fn run(ctx: &Context, args: CheckoutArgs) -> Result<()> {
    let address = args.delivery.address().await?;
    let fleet = args.delivery.fleet.into();

    if let Some(coupon) = args.coupon.coupon() {
        let items = ctx.cart.items().await;
        ctx.pricing
            .apply_coupon(coupon, &items, address.as_ref(), fleet)
            .await?;
    }

    let zones = ZoneResolver::new(ctx.gateway.clone(), ctx.config.zone_cache_ttl);
    let zone_id = match &address {
        Some(address) => match zones.zone_for_address(address).await {
            Ok(Some(zone)) => Some(zone.id),
            Ok(None) => {
                warn!("Delivery address is outside every active zone");
                None
            }
            Err(e) => {
                warn!("Zone detection failed: {e}");
                None
            }
        },
        None => None,
    };

    let restaurant = match (args.restaurant_id, args.restaurant_name) {
        (None, None) => None,
        (id, name) => Some(RestaurantRecord {
            id: id.unwrap_or_default(),
            name: name.unwrap_or_default(),
        }),
    };

    let assembler = OrderAssembler::new(
        ctx.cart.clone(),
        ctx.pricing.clone(),
        ctx.gateway.clone(),
        ctx.gateway.clone(),
        StdinPaymentFlow::new(),
    );
    let request = CheckoutRequest {
        address,
        restaurant,
        payment_method: args.payment.into(),
        fleet,
        note: args.note,
        send_cutlery: !args.no_cutlery,
        zone_id,
    };

    match assembler.place_order(&request).await {
        Ok(order) => {
            info!(order_id = %order.order_id, "Order placed");
            println!("Order {} placed", order.order_id);
            Ok(())
        }
        Err(e) => {
            println!("{e}");
            anyhow::bail!("checkout ended in {:?} (next step: {:?})", assembler.state(), e.recovery())
        }
    }
}
