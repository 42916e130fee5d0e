use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, QrService, SeaOrmAuthService, SeaOrmQrService};

/// Application-wide state behind the API: configuration, the store, and
/// the domain services built on it.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub qr_service: Arc<dyn QrService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.auth.clone(),
            config.security.clone(),
        ));

        let qr_service: Arc<dyn QrService> = Arc::new(SeaOrmQrService::new(
            store.clone(),
            config.qr.clone(),
            config.server.public_url.clone(),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            auth_service,
            qr_service,
        })
    }
}
