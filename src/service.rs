//! The JSON validation service: construction and startup.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;

use crate::config::{resolve_config, validate_config, ConfigError, ServiceConfig};
use crate::error::JvsError;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};
use crate::registry::{CompileSettings, RegistryError, SchemaRegistry, SchemaWatcher};

/// A configured, not yet started validation service.
#[derive(Debug)]
pub struct JsonValidationService {
    config: Arc<ServiceConfig>,
    registry: Arc<SchemaRegistry>,
    shutdown: Shutdown,
}

impl JsonValidationService {
    /// Build the service from `$JVS_CONFIG`, `./jvs.toml` or defaults.
    ///
    /// Installs the global tracing subscriber as a side effect.
    pub fn new() -> Result<Self, JvsError> {
        let config = resolve_config()?;
        logging::init_logging(&config.observability)?;

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            bind_address = %config.listener.bind_address,
            schema_directory = ?config.schemas.directory,
            "Configuration loaded"
        );

        Self::with_config(config)
    }

    /// Build the service from an explicit configuration.
    pub fn with_config(config: ServiceConfig) -> Result<Self, JvsError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(SchemaRegistry::new(CompileSettings {
            validate_formats: config.validation.validate_formats,
        }));
        if let Some(dir) = &config.schemas.directory {
            let dir = Path::new(dir);
            if dir.exists() || !config.schemas.persist {
                registry.load_directory(dir)?;
            } else {
                tracing::info!(directory = %dir.display(), "Schema directory will be created on first persist");
            }
        }

        Ok(Self {
            config: Arc::new(config),
            registry,
            shutdown: Shutdown::new(),
        })
    }

    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.registry)
    }

    /// Handle that stops the service once triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Bind the configured listener and serve until SIGINT/SIGTERM.
    pub async fn start(self) -> Result<(), JvsError> {
        let _signals = signals::forward_signals(self.shutdown.clone());

        let address = self.config.listener.bind_address.clone();
        match self.config.listener.tls.clone() {
            Some(tls) => {
                let addr: SocketAddr = address.parse().map_err(|e| JvsError::Bind {
                    address: address.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?;
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(JvsError::Tls)?;
                self.serve(|server, shutdown_rx| server.run_tls(addr, rustls, shutdown_rx))
                    .await
            }
            None => {
                let listener = TcpListener::bind(&address)
                    .await
                    .map_err(|source| JvsError::Bind { address, source })?;
                self.start_on(listener).await
            }
        }
    }

    /// Serve on an already bound listener. TLS settings are ignored.
    pub async fn start_on(self, listener: TcpListener) -> Result<(), JvsError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Listening for connections");
        }
        self.serve(|server, shutdown_rx| server.run(listener, shutdown_rx))
            .await
    }

    async fn serve<F, Fut>(self, run: F) -> Result<(), JvsError>
    where
        F: FnOnce(HttpServer, tokio::sync::broadcast::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = std::io::Result<()>>,
    {
        let shutdown_rx = self.shutdown.subscribe();

        if self.config.observability.metrics_enabled {
            let addr: SocketAddr = self
                .config
                .observability
                .metrics_address
                .parse()
                .map_err(|e| JvsError::Bind {
                    address: self.config.observability.metrics_address.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?;
            metrics::init_metrics(addr)?;
        }
        metrics::record_registry_size(self.registry.len());

        // Dropping the watcher stops it, so it lives until the server returns.
        let _watcher = match (&self.config.schemas.directory, self.config.schemas.watch) {
            (Some(dir), true) => {
                let dir = Path::new(dir);
                // Only reachable with `persist`; otherwise construction required the directory.
                if !dir.exists() {
                    fs::create_dir_all(dir).map_err(|source| RegistryError::Io {
                        path: dir.to_path_buf(),
                        source,
                    })?;
                }
                Some(SchemaWatcher::new(dir, Arc::clone(&self.registry)).run()?)
            }
            _ => None,
        };

        let server = HttpServer::new(Arc::clone(&self.config), Arc::clone(&self.registry));
        run(server, shutdown_rx).await.map_err(JvsError::Serve)?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
