use std::path::PathBuf;

use anyhow::{Context as _, Result};
use app_config::AppConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use model::{Coupon, DeliveryAddress, DeliveryFleet, Pricing};
use rust_decimal::Decimal;

use crate::context::Context;

mod cart;
mod checkout;
mod quote;

#[derive(Debug, Parser)]
#[command(name = "checkout-cli", about = "Cart, pricing and checkout client", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect or edit the cart.
    Cart(cart::CartCommand),
    /// Price the cart for an address.
    Quote(quote::QuoteArgs),
    /// Apply a coupon and price the cart with it.
    Coupon(quote::CouponCommandArgs),
    /// Place an order for the cart.
    Checkout(checkout::CheckoutArgs),
}

impl Cli {
    pub(crate) async fn run(self, config: AppConfig) -> Result<()> {
        let ctx = Context::init(config).await?;
        match self.command {
            Commands::Cart(command) => cart::run(&ctx, command).await,
            Commands::Quote(args) => quote::run(&ctx, args).await,
            Commands::Coupon(args) => quote::apply(&ctx, args).await,
            Commands::Checkout(args) => checkout::run(&ctx, args).await,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Fleet {
    Standard,
    PureVeg,
}

impl From<Fleet> for DeliveryFleet {
    fn from(fleet: Fleet) -> Self {
        match fleet {
            Fleet::Standard => DeliveryFleet::Standard,
            Fleet::PureVeg => DeliveryFleet::PureVeg,
        }
    }
}

/// Delivery options shared by every pricing command.
#[derive(Debug, Args)]
struct DeliveryArgs {
    /// JSON file holding the delivery address
    #[arg(long)]
    address: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "standard")]
    fleet: Fleet,
}

impl DeliveryArgs {
    async fn address(&self) -> Result<Option<DeliveryAddress>> {
        let Some(path) = &self.address else {
            return Ok(None);
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read address file {}", path.display()))?;
        let address = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid address in {}", path.display()))?;
        Ok(Some(address))
    }
}

#[derive(Debug, Args)]
struct CouponArgs {
    /// Coupon code, matched case-sensitively by the backend
    #[arg(long)]
    coupon: Option<String>,

    /// Amount the coupon takes off
    #[arg(long, requires = "coupon", default_value = "0")]
    discount: Decimal,

    /// Minimum subtotal for the coupon
    #[arg(long, requires = "coupon", default_value = "0")]
    min_order: Decimal,
}

impl CouponArgs {
    fn coupon(&self) -> Option<Coupon> {
        self.coupon.as_ref().map(|code| Coupon {
            code: code.clone(),
            discount: self.discount,
            min_order: self.min_order,
            item_id: None,
            item_name: None,
        })
    }
}

fn print_pricing(pricing: &Pricing) {
    let b = pricing.breakdown().rounded();
    if !pricing.is_authoritative() {
        println!("(estimate, the pricing service is unreachable)");
    }
    println!("subtotal      {}", b.subtotal);
    println!("delivery fee  {}", b.delivery_fee);
    println!("platform fee  {}", b.platform_fee);
    println!("tax           {}", b.tax);
    if !b.discount.is_zero() {
        let code = b.applied_coupon.as_deref().unwrap_or("coupon");
        println!("discount      -{} ({code})", b.discount);
    }
    println!("total         {}", b.total);
    if !b.savings.is_zero() {
        println!("you save      {}", b.savings);
    }
}
