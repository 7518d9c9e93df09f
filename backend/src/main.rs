use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use moneymate_backend::{ServiceLocator, StorageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StorageConfig::from_env().context("reading storage configuration")?;
    info!("Using {} storage in {}", config.backend, config.data_dir.display());
    let locator = ServiceLocator::new(config);

    match std::env::args().nth(1).as_deref() {
        None | Some("status") => {}
        Some("reset") => {
            let report = locator.clear_all_data().await.context("resetting data")?;
            info!(
                "Restored defaults: {} categories, {} accounts, {} settings",
                report.categories, report.accounts, report.settings
            );
        }
        Some(other) => anyhow::bail!("unknown command '{}', expected 'status' or 'reset'", other),
    }

    let services = locator.services().await.context("opening storage")?;
    let accounts = services.account_service.get_all_accounts().await?;
    let categories = services.category_service.get_all_categories().await?;
    let total_balance = services.account_service.get_total_balance().await?;
    let stats = services
        .transaction_service
        .get_transaction_stats(None, None)
        .await?;

    let status = json!({
        "backend": services.database.kind().as_str(),
        "accounts": accounts.len(),
        "categories": categories.len(),
        "totalBalance": total_balance,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);

    locator.shutdown().await?;
    Ok(())
}
