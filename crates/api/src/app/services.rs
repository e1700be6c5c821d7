use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crm_auth::{
    AccountService, AccountTokenGenerator, AuthzError, CredentialStore, Mailer, RevocationList,
    RoleResolver, StoreError, TokenConfig, TokenService,
};
use crm_catalog::CatalogStore;
use crm_infra::{
    AppConfig, InMemoryCatalogStore, InMemoryCredentialStore, InMemoryRevocationList, LogMailer,
    PostgresCredentialStore, PostgresRevocationList, identity,
};

use crate::cookies::CookieSettings;

/// Storage and delivery collaborators the API runs against.
#[derive(Clone)]
pub struct Backends {
    pub credentials: Arc<dyn CredentialStore>,
    pub revocations: Arc<dyn RevocationList>,
    pub catalog: Arc<dyn CatalogStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl Backends {
    /// Everything in process memory; mail goes to the log.
    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::new()),
            revocations: Arc::new(InMemoryRevocationList::new()),
            catalog: Arc::new(InMemoryCatalogStore::new()),
            mailer: Arc::new(LogMailer),
        }
    }

    /// Postgres-backed users, roles and revocations. Catalog records stay in memory.
    pub async fn postgres(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("connect: {e}")))?;
        identity::migrate(&pool).await?;
        tracing::info!("connected to Postgres; identity schema ready");

        Ok(Self {
            credentials: Arc::new(PostgresCredentialStore::new(pool.clone())),
            revocations: Arc::new(PostgresRevocationList::new(pool)),
            catalog: Arc::new(InMemoryCatalogStore::new()),
            mailer: Arc::new(LogMailer),
        })
    }
}

/// Shared services behind every handler.
#[derive(Clone)]
pub struct AppServices {
    pub tokens: TokenService,
    pub roles: RoleResolver,
    pub accounts: AccountService,
    pub credentials: Arc<dyn CredentialStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub cookies: CookieSettings,
}

pub fn build_services(config: &AppConfig, backends: Backends) -> Result<AppServices, AuthzError> {
    let token_config = TokenConfig::new(config.jwt_secret.clone())
        .with_ttls(config.access_token_ttl_secs, config.refresh_token_ttl_secs);
    let tokens = TokenService::new(token_config, backends.credentials.clone(), backends.revocations)?;

    let account_tokens = AccountTokenGenerator::new(&config.jwt_secret, config.account_token_ttl_secs)?;
    let accounts = AccountService::new(
        backends.credentials.clone(),
        account_tokens,
        backends.mailer,
        config.public_base_url.clone(),
    );

    Ok(AppServices {
        tokens,
        roles: RoleResolver::new(backends.credentials.clone()),
        accounts,
        credentials: backends.credentials,
        catalog: backends.catalog,
        cookies: CookieSettings::new(config.session_cookie_secure),
    })
}
