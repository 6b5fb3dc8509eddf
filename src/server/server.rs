use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub group_service: Arc<dyn GroupService>,
    pub log_service: Arc<dyn LogService>,
    pub profile_service: Arc<dyn ProfileService>,
    repair_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    mysql: Option<Arc<MySqlDocumentStore>>,
}

/// Tunables for the group engine, taken from the `[groups]` settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub invite_code_length: usize,
    pub max_commit_attempts: usize,
    pub default_max_members: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            invite_code_length: DEFAULT_INVITE_CODE_LENGTH,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            default_max_members: crate::domain_model::DEFAULT_GROUP_SIZE,
        }
    }
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut mysql = None;
        let store: Arc<dyn DocumentStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryDocumentStore::new()),
            "mysql" => {
                let dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.mysql_dsn is required for the mysql backend"))?;
                let store = Arc::new(MySqlDocumentStore::connect(dsn).await?);
                store.ensure_schema().await?;
                mysql = Some(store.clone());
                store
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let auth_service: Arc<dyn AuthService> = match settings.auth.backend.as_str() {
            "fake" => Arc::new(FakeAuthService::new()),
            "real" => {
                let key = std::env::var("JWT_SIGNING_KEY")
                    .map_err(|_| anyhow::anyhow!("JWT_SIGNING_KEY must be set for the real auth backend"))?
                    .into_bytes();
                Arc::new(JwtAuthService::new(JwtConfig {
                    issuer: settings.auth.issuer.clone(),
                    audience: settings.auth.audience.clone(),
                    signing_key: key,
                }))
            }
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        let options = EngineOptions {
            invite_code_length: settings.groups.invite_code_length,
            max_commit_attempts: settings.groups.max_commit_attempts,
            default_max_members: settings.groups.default_max_members,
        };

        let mut server = Self::with_backends(store, auth_service, &options);
        server.mysql = mysql;

        info!(
            store = %settings.store.backend,
            auth = %settings.auth.backend,
            "server started"
        );
        Ok(server)
    }

    /// Wires the services over the given backends and starts the repair worker.
    /// Must be called inside a tokio runtime.
    pub fn with_backends(
        store: Arc<dyn DocumentStore>,
        auth_service: Arc<dyn AuthService>,
        options: &EngineOptions,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (repair_queue, repair_worker) = RepairQueue::new(cancel.clone());

        let group_service: Arc<dyn GroupService> = Arc::new(
            RealGroupService::new(
                store.clone(),
                Arc::new(NanoidCodeGenerator::new(options.invite_code_length)),
                Arc::new(repair_queue),
            )
            .with_max_commit_attempts(options.max_commit_attempts)
            .with_default_max_members(options.default_max_members),
        );
        let log_service: Arc<dyn LogService> = Arc::new(
            RealLogService::new(store.clone()).with_max_commit_attempts(options.max_commit_attempts),
        );
        let profile_service: Arc<dyn ProfileService> = Arc::new(RealProfileService::new(store));

        let repair_handle = tokio::spawn(repair_worker.run(group_service.clone()));

        Self {
            auth_service,
            group_service,
            log_service,
            profile_service,
            repair_handle: Mutex::new(Some(repair_handle)),
            cancel,
            mysql: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.repair_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("repair worker stopped: {:?}", r);
        }

        if let Some(mysql) = &self.mysql {
            mysql.close().await;
        }
    }
}
