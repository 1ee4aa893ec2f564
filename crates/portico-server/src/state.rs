//! Shared application state.

use portico_audit::{AuditRecorder, AuditStore, FileStore, MemoryStore};
use portico_auth::{AccountService, AuthStore, MemoryAuthStore, PermissionResolver};
use portico_core::{AuditSink, PorticoConfig};
use portico_pg::{PgAuditStore, PgAuthStore};
use std::sync::Arc;

/// Everything the handlers and middleware share. Passed around as
/// `Arc<AppState>`.
pub struct AppState {
    pub config: PorticoConfig,
    pub auth_store: Arc<dyn AuthStore>,
    pub audit_store: Arc<dyn AuditStore>,
    pub recorder: AuditRecorder,
    pub resolver: PermissionResolver,
    pub accounts: AccountService,
}

impl AppState {
    /// Wire the full state from configuration.
    ///
    /// With a `database.url` the stores run on Postgres (running pending
    /// migrations on the way up); without one everything lives in process
    /// memory, which is only suitable for development.
    pub async fn init(config: PorticoConfig) -> anyhow::Result<Arc<Self>> {
        let pool = match &config.database.url {
            Some(url) => Some(portico_pg::connect(url, config.database.max_connections).await?),
            None => None,
        };

        let auth_store: Arc<dyn AuthStore> = match &pool {
            Some(pool) => Arc::new(PgAuthStore::new(pool.clone())),
            None => {
                tracing::warn!("no database configured, account data will not survive a restart");
                Arc::new(MemoryAuthStore::new())
            }
        };

        let audit_store: Arc<dyn AuditStore> = match config.audit.sink {
            AuditSink::Memory => Arc::new(MemoryStore::new()),
            AuditSink::File => Arc::new(FileStore::new(&config.audit.file_path)),
            AuditSink::Postgres => {
                let Some(pool) = &pool else {
                    anyhow::bail!("audit sink 'postgres' requires database.url");
                };
                Arc::new(PgAuditStore::new(pool.clone()))
            }
        };

        Ok(Self::assemble(config, auth_store, audit_store))
    }

    /// Assemble state from explicit stores. Tests inject in-memory fakes
    /// through this; [`AppState::init`] goes through it too.
    ///
    /// Must be called from within a tokio runtime: an enabled recorder
    /// spawns its writer task here.
    pub fn assemble(
        config: PorticoConfig,
        auth_store: Arc<dyn AuthStore>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Arc<Self> {
        let recorder = if config.audit.enabled {
            AuditRecorder::new(audit_store.clone(), config.audit.queue_capacity)
        } else {
            tracing::warn!("audit recording is disabled by configuration");
            AuditRecorder::disabled()
        };

        let resolver = PermissionResolver::new(auth_store.clone());
        let accounts = AccountService::new(auth_store.clone(), recorder.clone(), config.auth.clone());

        Arc::new(Self {
            config,
            auth_store,
            audit_store,
            recorder,
            resolver,
            accounts,
        })
    }
}
