//! Kirana CLI - checkout operator tools.
//!
//! # Usage
//!
//! ```bash
//! # List payment and shipping methods
//! kirana-cli options
//!
//! # Backend summary for the signed-in shopper's cart
//! kirana-cli --token "$SHOPPER_TOKEN" summary --shipping 1
//!
//! # Manage a shopper's addresses
//! kirana-cli --token "$SHOPPER_TOKEN" addresses list
//! kirana-cli --token "$SHOPPER_TOKEN" addresses remove 4
//!
//! # Record a gateway payment the storefront failed to record
//! kirana-cli reconcile --order 77 --payment-method 3 --amount 540 \
//!     --payment-id pay_1 --gateway-order g1 --signature <sig>
//! ```
//!
//! # Commands
//!
//! - `options` - List payment and shipping methods
//! - `summary` - Show the backend checkout summary
//! - `addresses` - List, add, update and remove addresses
//! - `reconcile` - Verify a gateway payment, then record it

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use kirana_core::{AddressId, CurrencyCode, OrderId, PaymentMethodId, ShippingMethodId};
use kirana_storefront::backend::AddressInput;
use rust_decimal::Decimal;

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "kirana-cli")]
#[command(author, version, about = "Kirana checkout operator tools")]
struct Cli {
    /// Act as a shopper by forwarding their bearer token
    #[arg(long, global = true, env = "KIRANA_SHOPPER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List payment and shipping methods
    Options,
    /// Show the backend checkout summary for a shipping method
    Summary {
        /// Shipping method id
        #[arg(long)]
        shipping: ShippingMethodId,
    },
    /// Manage saved addresses
    Addresses {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Verify a gateway payment, then record it against its order
    Reconcile(ReconcileArgs),
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add(AddressArgs),
    /// Replace an existing address
    Update {
        id: AddressId,
        #[command(flatten)]
        address: AddressArgs,
    },
    /// Delete an address
    Remove { id: AddressId },
}

#[derive(Args)]
struct AddressArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    line1: String,
    #[arg(long)]
    line2: Option<String>,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long, default_value = "India")]
    country: String,
    #[arg(long)]
    postal_code: String,
    #[arg(long)]
    phone: Option<String>,
}

impl From<AddressArgs> for AddressInput {
    fn from(args: AddressArgs) -> Self {
        Self {
            full_name: args.full_name,
            address_line1: args.line1,
            address_line2: args.line2,
            city: args.city,
            state: args.state,
            country: args.country,
            postal_code: args.postal_code,
            phone: args.phone,
        }
    }
}

#[derive(Args)]
struct ReconcileArgs {
    /// Order the payment belongs to
    #[arg(long)]
    order: OrderId,
    /// Payment method used for the order
    #[arg(long)]
    payment_method: PaymentMethodId,
    /// Amount charged, in major units
    #[arg(long)]
    amount: Decimal,
    #[arg(long, default_value = "INR")]
    currency: CurrencyCode,
    /// Gateway payment id (`pay_...`)
    #[arg(long)]
    payment_id: String,
    /// Gateway order id (`order_...`)
    #[arg(long)]
    gateway_order: String,
    /// Gateway signature
    #[arg(long)]
    signature: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::from_env(cli.token)?;
    match cli.command {
        Commands::Options => commands::options::list(&ctx).await?,
        Commands::Summary { shipping } => commands::summary::show(&ctx, shipping).await?,
        Commands::Addresses { action } => match action {
            AddressAction::List => commands::addresses::list(&ctx).await?,
            AddressAction::Add(address) => {
                commands::addresses::add(&ctx, &address.into()).await?;
            }
            AddressAction::Update { id, address } => {
                commands::addresses::update(&ctx, id, &address.into()).await?;
            }
            AddressAction::Remove { id } => commands::addresses::remove(&ctx, id).await?,
        },
        Commands::Reconcile(args) => {
            commands::reconcile::run(
                &ctx,
                commands::reconcile::Reconciliation {
                    order_id: args.order,
                    payment_method_id: args.payment_method,
                    amount: args.amount,
                    currency: args.currency,
                    payment_id: args.payment_id,
                    gateway_order_id: args.gateway_order,
                    signature: args.signature,
                },
            )
            .await?;
        }
    }
    Ok(())
}
