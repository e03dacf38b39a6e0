//! `kirana-cli options`.

use serde_json::json;

use super::{CliError, Context, print_json};

/// Print the payment and shipping methods a shopper can choose from.
pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let (payment_methods, shipping_methods) = tokio::try_join!(
        ctx.backend.payment_methods(),
        ctx.backend.shipping_methods(),
    )?;
    print_json(&json!({
        "payment_methods": payment_methods,
        "shipping_methods": shipping_methods,
    }))
}
