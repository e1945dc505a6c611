use anyhow::Result;
use clap::Args;
use pricing::Recalculation;
use tracing::info;

use super::{CouponArgs, DeliveryArgs, print_pricing};
use crate::context::Context;

#[derive(Debug, Args)]
pub(crate) struct QuoteArgs {
    #[command(flatten)]
    delivery: DeliveryArgs,

    /// Refresh the fallback fee schedule from the backend first
    #[arg(long)]
    refresh_fees: bool,
}

#[derive(Debug, Args)]
pub(crate) struct CouponCommandArgs {
    #[command(flatten)]
    delivery: DeliveryArgs,

    #[command(flatten)]
    coupon: CouponArgs,
}

pub(crate) async fn run(ctx: &Context, args: QuoteArgs) -> Result<()> {
    if args.refresh_fees && !ctx.pricing.refresh_fee_settings().await {
        info!("Using configured fallback fees");
    }
    let address = args.delivery.address().await?;
    let items = ctx.cart.items().await;
    let outcome = ctx
        .pricing
        .calculate_pricing(&items, address.as_ref(), args.delivery.fleet.into())
        .await;
    report(outcome);
    Ok(())
}

pub(crate) async fn apply(ctx: &Context, args: CouponCommandArgs) -> Result<()> {
    let Some(coupon) = args.coupon.coupon() else {
        anyhow::bail!("--coupon is required");
    };
    let address = args.delivery.address().await?;
    let items = ctx.cart.items().await;
    let outcome = ctx
        .pricing
        .apply_coupon(coupon, &items, address.as_ref(), args.delivery.fleet.into())
        .await?;
    report(outcome);
    Ok(())
}

fn report(outcome: Recalculation) {
    match outcome {
        Recalculation::Updated(Some(pricing)) => print_pricing(&pricing),
        Recalculation::Updated(None) => {
            println!("No pricing available (empty cart, no address or not served)");
        }
        Recalculation::Superseded => {}
    }
}
