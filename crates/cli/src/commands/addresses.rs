//! `kirana-cli addresses`.

use kirana_core::AddressId;
use kirana_storefront::backend::AddressInput;

use super::{CliError, Context, print_json};

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    print_json(&ctx.backend.addresses().await?)
}

pub async fn add(ctx: &Context, address: &AddressInput) -> Result<(), CliError> {
    let saved = ctx.backend.create_address(address).await?;
    tracing::info!(id = %saved.id, "Address saved");
    print_json(&saved)
}

pub async fn update(ctx: &Context, id: AddressId, address: &AddressInput) -> Result<(), CliError> {
    let saved = ctx.backend.update_address(id, address).await?;
    tracing::info!(%id, "Address updated");
    print_json(&saved)
}

pub async fn remove(ctx: &Context, id: AddressId) -> Result<(), CliError> {
    ctx.backend.delete_address(id).await?;
    tracing::info!(%id, "Address removed");
    Ok(())
}
