//! Connection management.
//!
//! A [`Connection`] owns the handles of exactly one backend: an [`Executor`]
//! for the relational engines or a [`DocumentStore`] for the document engine.
//! [`ConnectionManager`] holds at most one live connection and hands out shared
//! references to it.

use crate::db::document::DocumentStore;
use crate::db::executor::{Executor, MySqlExecutor, PgExecutor, SqliteExecutor, WriteOutcome};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionConfig, FieldValue, Record};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The backend handle behind a connection.
#[derive(Debug, Clone)]
pub enum Backend {
    Relational(Arc<dyn Executor>),
    Document(DocumentStore),
}

impl Backend {
    async fn close(&self) {
        match self {
            Backend::Relational(executor) => executor.close().await,
            Backend::Document(store) => store.close().await,
        }
    }
}

/// An established connection to one backend.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    backend: Backend,
}

impl Connection {
    /// Open the backend named by `config.kind` and run its liveness probe.
    pub async fn open(config: ConnectionConfig) -> DbResult<Self> {
        config
            .pool_options
            .validate()
            .map_err(|e| DbError::connection(e, "Fix the pool options in the connection URL"))?;

        info!(
            kind = %config.kind,
            url = %config.masked_connection_string(),
            "Connecting to database"
        );

        let backend = match config.kind {
            BackendKind::RelationalNumbered => {
                Backend::Relational(Arc::new(PgExecutor::connect(&config).await?))
            }
            BackendKind::RelationalPositional => {
                Backend::Relational(Arc::new(MySqlExecutor::connect(&config).await?))
            }
            BackendKind::EmbeddedFile => {
                Backend::Relational(Arc::new(SqliteExecutor::connect(&config).await?))
            }
            BackendKind::Document => Backend::Document(DocumentStore::connect(&config).await?),
        };

        info!(kind = %config.kind, "Connected successfully");
        Ok(Self { config, backend })
    }

    /// Wrap an already constructed executor.
    ///
    /// The configured kind is taken from the executor.
    pub fn from_executor(mut config: ConnectionConfig, executor: Arc<dyn Executor>) -> Self {
        config.kind = executor.kind();
        Self {
            config,
            backend: Backend::Relational(executor),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The statement executor of a relational connection.
    pub fn executor(&self) -> DbResult<&Arc<dyn Executor>> {
        match &self.backend {
            Backend::Relational(executor) => Ok(executor),
            Backend::Document(_) => Err(DbError::unsupported("SQL execution", self.kind().as_str())),
        }
    }

    /// The document-store handle of a document connection.
    pub fn document_store(&self) -> DbResult<&DocumentStore> {
        match &self.backend {
            Backend::Document(store) => Ok(store),
            Backend::Relational(_) => {
                Err(DbError::unsupported("document store access", self.kind().as_str()))
            }
        }
    }

    /// Execute a statement and return its rows.
    pub async fn query(&self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Record>> {
        self.executor()?.query(sql, params).await
    }

    /// Execute a statement for its side effects.
    pub async fn execute(&self, sql: &str, params: &[FieldValue]) -> DbResult<WriteOutcome> {
        self.executor()?.execute(sql, params).await
    }

    /// Release every backend handle.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}

/// Owner of the single live connection.
///
/// Cloning the manager yields another handle to the same slot.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    active: Arc<RwLock<Option<Arc<Connection>>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect, or return the existing connection.
    ///
    /// The first successful configuration wins. Later calls never reconnect;
    /// a differing configuration is logged and ignored.
    pub async fn connect(&self, config: ConnectionConfig) -> DbResult<Arc<Connection>> {
        {
            let active = self.active.read().await;
            if let Some(existing) = active.as_ref() {
                Self::warn_if_reconfigured(existing, &config);
                return Ok(Arc::clone(existing));
            }
        }

        let connection = Arc::new(Connection::open(config.clone()).await?);

        // Re-check after async work; a concurrent connect may have won
        let (winner, loser) = {
            let mut active = self.active.write().await;
            match active.as_ref() {
                Some(existing) => (Arc::clone(existing), Some(connection)),
                None => {
                    *active = Some(Arc::clone(&connection));
                    (connection, None)
                }
            }
        };

        if let Some(loser) = loser {
            Self::warn_if_reconfigured(&winner, &config);
            loser.close().await;
        }

        Ok(winner)
    }

    fn warn_if_reconfigured(existing: &Connection, config: &ConnectionConfig) {
        let current = existing.config();
        if current.kind != config.kind || current.connection_string != config.connection_string {
            warn!(
                active_kind = %current.kind,
                requested_kind = %config.kind,
                requested_url = %config.masked_connection_string(),
                "Already connected, ignoring new configuration"
            );
        }
    }

    /// Get the live connection.
    pub async fn connection(&self) -> DbResult<Arc<Connection>> {
        self.active.read().await.clone().ok_or_else(|| {
            DbError::connection("Not connected", "Call connect before issuing queries")
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Backend kind of the live connection.
    pub async fn kind(&self) -> Option<BackendKind> {
        self.active.read().await.as_ref().map(|c| c.kind())
    }

    pub async fn query(&self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Record>> {
        self.connection().await?.query(sql, params).await
    }

    pub async fn document_store(&self) -> DbResult<DocumentStore> {
        self.connection().await?.document_store().cloned()
    }

    /// Close the live connection, if any.
    ///
    /// Callers must let in-flight operations finish first.
    pub async fn disconnect(&self) {
        let connection = self.active.write().await.take();
        if let Some(connection) = connection {
            info!(kind = %connection.kind(), "Closing connection");
            connection.close().await;
        }
    }
}
