use anyhow::Context;

use crm_api::app::{self, Backends};
use crm_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crm_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let backends = match config.database_url.as_deref() {
        Some(url) => Backends::postgres(url).await.context("identity database")?,
        None => {
            tracing::warn!("DATABASE_URL not set; users, roles and revocations are in memory");
            Backends::in_memory()
        }
    };

    let services = app::build_services(&config, backends).context("service wiring")?;

    if let Some(seed) = &config.admin_seed {
        let admin = services
            .accounts
            .provision_superuser(&seed.email, &seed.password)
            .context("bootstrap admin")?;
        tracing::info!(user_id = %admin.id, "bootstrap admin ready");
    }

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
