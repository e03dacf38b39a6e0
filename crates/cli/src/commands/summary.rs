//! `kirana-cli summary`.

use kirana_core::ShippingMethodId;

use super::{CliError, Context, print_json};

/// Print the backend checkout summary for `shipping`.
pub async fn show(ctx: &Context, shipping: ShippingMethodId) -> Result<(), CliError> {
    let summary = ctx.backend.cart_summary(shipping).await?;
    print_json(&summary)
}
