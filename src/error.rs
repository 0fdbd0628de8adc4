//! The error kind raised while constructing or starting the service.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::logging::TryInitError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum JvsError {
    #[error("failed to load configuration")]
    Config(#[from] ConfigError),

    #[error("failed to initialise schema registry")]
    Registry(#[from] RegistryError),

    #[error("failed to initialise logging")]
    Logging(#[from] TryInitError),

    #[error("failed to bind listener on {address}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load TLS certificate or key")]
    Tls(#[source] io::Error),

    #[error("failed to start metrics exporter")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch schema directory")]
    Watch(#[from] notify::Error),

    #[error("server terminated abnormally")]
    Serve(#[source] io::Error),
}

impl JvsError {
    /// This error followed by every underlying cause, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_walks_sources() {
        let err = JvsError::Bind {
            address: "127.0.0.1:1".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(
            err.chain(),
            vec!["failed to bind listener on 127.0.0.1:1", "address in use"]
        );
    }

    #[test]
    fn registry_error_converts() {
        let err: JvsError = RegistryError::NotFound("x".into()).into();
        assert_eq!(err.chain().len(), 2);
    }
}
