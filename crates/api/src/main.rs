use std::sync::Arc;

use anyhow::Context;

use gstbook_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gstbook_observability::init();

    let config = ApiConfig::from_env()?;
    let services = Arc::new(gstbook_api::app::build_services(&config).await?);
    let app = gstbook_api::app::build_app(config.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
