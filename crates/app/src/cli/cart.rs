use anyhow::Result;
use clap::{Args, Subcommand};
use model::{NewCartItem, ProductInfo};
use rust_decimal::Decimal;

use crate::context::Context;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// List the cart.
    Show,
    /// Add one unit of an item.
    Add(AddArgs),
    /// Set an item's quantity; zero or less removes it.
    Set {
        item_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove an item.
    Remove { item_id: String },
    /// Empty the cart.
    Clear,
    /// Keep only one restaurant's items.
    Clean {
        #[arg(long)]
        restaurant_id: String,
        #[arg(long, default_value = "")]
        restaurant: String,
    },
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: Decimal,
    /// Price before markdown
    #[arg(long)]
    original_price: Option<Decimal>,
    #[arg(long)]
    veg: bool,
    #[arg(long)]
    restaurant: String,
    #[arg(long)]
    restaurant_id: String,
}

pub(crate) async fn run(ctx: &Context, command: CartCommand) -> Result<()> {
    let cart = &ctx.cart;
    match command.command {
        CartSubcommand::Show => {}
        CartSubcommand::Add(args) => {
            let item = NewCartItem {
                id: args.id,
                name: args.name,
                price: args.price,
                image: None,
                description: None,
                is_veg: args.veg,
                original_price: args.original_price,
                restaurant: args.restaurant,
                restaurant_id: args.restaurant_id,
            };
            cart.add_to_cart(item, None).await?;
        }
        CartSubcommand::Set { item_id, quantity } => {
            let product = cart.cart_item(&item_id).await.map(|i| ProductInfo {
                name: i.name,
                image: i.image,
            });
            cart.update_quantity(&item_id, quantity, None, product).await;
        }
        CartSubcommand::Remove { item_id } => {
            cart.remove_from_cart(&item_id, None, None).await;
        }
        CartSubcommand::Clear => cart.clear_cart().await,
        CartSubcommand::Clean {
            restaurant_id,
            restaurant,
        } => {
            let removed = cart.clean_cart_for_restaurant(&restaurant_id, &restaurant).await;
            println!("Removed {removed} item(s)");
        }
    }

    let items = cart.items().await;
    if items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }
    println!("{}", items[0].restaurant);
    for item in &items {
        println!("  {:>3} x {:<30} {:>8}  [{}]", item.quantity, item.name, item.line_total(), item.id);
    }
    println!("  {} item(s), subtotal {}", cart.cart_count().await, cart.subtotal().await);
    Ok(())
}
