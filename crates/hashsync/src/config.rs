//! Session, server and backend configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use hashsync_store::{MemoryStore, SqliteStore, Store};
use hashsync_sync::ReconcileConfig;

use crate::error::{HashsyncError, Result};
use crate::session::{DispatchMode, Role};

/// Well-known server address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Environment variable overriding the server listen address.
pub const ENV_ADDR: &str = "HASHSYNC_ADDR";

/// Environment variable selecting the server store backend.
pub const ENV_STORE: &str = "HASHSYNC_STORE";

/// Which store backend to open.
///
/// Textual form: `memory`, `sqlite:PATH`, or `postgres:URL` (a bare
/// `postgres://` URL is accepted too).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
    Postgres {
        url: String,
    },
}

impl StoreBackend {
    /// Parse the textual form.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("memory") {
            return Ok(StoreBackend::Memory);
        }
        if let Some(path) = s.strip_prefix("sqlite:") {
            if path.is_empty() {
                return Err(HashsyncError::Config("sqlite backend needs a path".into()));
            }
            return Ok(StoreBackend::Sqlite { path: path.into() });
        }
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Ok(StoreBackend::Postgres { url: s.to_string() });
        }
        if let Some(url) = s.strip_prefix("postgres:") {
            if url.is_empty() {
                return Err(HashsyncError::Config("postgres backend needs a url".into()));
            }
            return Ok(StoreBackend::Postgres {
                url: url.to_string(),
            });
        }
        Err(HashsyncError::Config(format!("unknown store backend: {s}")))
    }

    /// Open the selected backend.
    pub async fn open(&self) -> Result<Arc<dyn Store>> {
        match self {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
            #[cfg(feature = "postgres")]
            StoreBackend::Postgres { url } => {
                Ok(Arc::new(hashsync_store::PostgresStore::connect(url).await?))
            }
            #[cfg(not(feature = "postgres"))]
            StoreBackend::Postgres { .. } => Err(HashsyncError::Config(
                "built without the `postgres` feature".into(),
            )),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = HashsyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Sqlite { path } => write!(f, "sqlite:{}", path.display()),
            // Credentials may be embedded in the url.
            StoreBackend::Postgres { .. } => f.write_str("postgres"),
        }
    }
}

/// Open a store for the given backend.
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn Store>> {
    backend.open().await
}

/// Configuration for one session endpoint.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether we announce on connect.
    pub role: Role,
    /// How inbound messages are scheduled.
    pub dispatch: DispatchMode,
    /// Protocol behavior.
    pub reconcile: ReconcileConfig,
    /// Buffered events per subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl SessionConfig {
    /// Announces on connect, handles messages concurrently.
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            dispatch: DispatchMode::Concurrent,
            reconcile: ReconcileConfig::default(),
            event_capacity: 64,
        }
    }

    /// Waits for the peer, handles messages in order.
    pub fn server() -> Self {
        Self {
            role: Role::Server,
            dispatch: DispatchMode::Sequential,
            ..Self::client()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_reconcile(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::client()
    }
}

/// Configuration for the TCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: String,
    /// Backend shared by every connection.
    pub store: StoreBackend,
    /// Per-connection session settings.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            store: StoreBackend::Memory,
            session: SessionConfig::server(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HASHSYNC_ADDR` and `HASHSYNC_STORE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup(ENV_ADDR).filter(|a| !a.trim().is_empty()) {
            config.addr = addr.trim().to_string();
        }
        if let Some(store) = lookup(ENV_STORE).filter(|s| !s.trim().is_empty()) {
            config.store = StoreBackend::parse(&store)?;
        }
        Ok(config)
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashsync_core::Record;
    use std::collections::HashMap;

    #[test]
    fn test_parse_backends() {
        assert_eq!(StoreBackend::parse("memory").unwrap(), StoreBackend::Memory);
        assert_eq!(
            StoreBackend::parse("sqlite:/tmp/records.db").unwrap(),
            StoreBackend::Sqlite {
                path: "/tmp/records.db".into()
            }
        );
        assert_eq!(
            StoreBackend::parse("postgres://u@localhost/db").unwrap(),
            StoreBackend::Postgres {
                url: "postgres://u@localhost/db".into()
            }
        );
        assert_eq!(
            "postgres:host=localhost".parse::<StoreBackend>().unwrap(),
            StoreBackend::Postgres {
                url: "host=localhost".into()
            }
        );
        assert!(StoreBackend::parse("sqlite:").is_err());
        assert!(StoreBackend::parse("redis://x").is_err());
    }

    #[test]
    fn test_display_hides_postgres_url() {
        let backend = StoreBackend::Postgres {
            url: "postgres://user:secret@db/records".into(),
        };
        assert!(!backend.to_string().contains("secret"));
        assert_eq!(
            StoreBackend::Sqlite {
                path: "a.db".into()
            }
            .to_string(),
            "sqlite:a.db"
        );
    }

    #[test]
    fn test_server_config_from_lookup() {
        let env: HashMap<&str, &str> =
            [(ENV_ADDR, "0.0.0.0:9000"), (ENV_STORE, "sqlite:server.db")].into();
        let config = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(
            config.store,
            StoreBackend::Sqlite {
                path: "server.db".into()
            }
        );
        assert_eq!(config.session.role, Role::Server);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.store, StoreBackend::Memory);

        let bad = ServerConfig::from_lookup(|k| (k == ENV_STORE).then(|| "nope".to_string()));
        assert!(matches!(bad, Err(HashsyncError::Config(_))));
    }

    #[test]
    fn test_session_config_roles() {
        let client = SessionConfig::default();
        assert_eq!(client.role, Role::Client);
        assert_eq!(client.dispatch, DispatchMode::Concurrent);

        let server = SessionConfig::server();
        assert_eq!(server.role, Role::Server);
        assert_eq!(server.dispatch, DispatchMode::Sequential);
        assert!(server.reconcile.confirm_after_apply);
    }

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::Sqlite {
            path: dir.path().join("records.db"),
        };

        let store = open_store(&backend).await.unwrap();
        store.put(&Record::new("1", "hello", 1000)).await.unwrap();
        drop(store);

        let reopened = open_store(&backend).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_requires_feature() {
        let backend = StoreBackend::parse("postgres://localhost/db").unwrap();
        assert!(matches!(
            open_store(&backend).await,
            Err(HashsyncError::Config(_))
        ));
    }
}
