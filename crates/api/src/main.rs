use anyhow::Context;

use invoicedesk_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    invoicedesk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    config
        .ensure_dirs()
        .await
        .context("failed to create output/scratch directories")?;

    let app = invoicedesk_api::app::build_app_from_config(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
