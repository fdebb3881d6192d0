use anyhow::Context;

use atelier_infra::SizingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match SizingConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            // Log format is unknown until config loads.
            atelier_observability::init();
            tracing::error!(error = %format!("{err:#}"), "invalid configuration");
            return Err(err);
        }
    };
    atelier_observability::init_with(config.log_format);

    let app = atelier_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
