//! Top-level configuration.

use std::net::SocketAddr;

use formlog_store::StoreConfig;

/// Settings for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address the server binds.
    pub listen_addr: SocketAddr,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            permissive_cors: true,
        }
    }
}

/// Configuration for a whole formlog process.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Where and how the record store is opened.
    pub store: StoreConfig,
    /// HTTP adapter settings. Ignored by the pipe worker.
    pub http: HttpConfig,
}
