//! Connection management for MongoDB
//!
//! Establishes the client used by every lane, verifies it with a ping and
//! hands out collection handles. Connection and authentication failures
//! surface here, before any lane starts.

use std::time::Instant;

use mongodb::bson::{Document, doc};
use mongodb::{Client, Collection, options::ClientOptions};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// MongoDB connection manager
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Connection URI
    uri: String,
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Server version
    pub server_version: Option<String>,
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `config` - Connection configuration
    pub fn new(uri: String, config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            uri,
        }
    }

    /// Establish connection to MongoDB and verify it with a ping
    ///
    /// # Returns
    /// * `Result<HealthStatus>` - Server round-trip information or connection error
    pub async fn connect(&mut self) -> Result<HealthStatus> {
        let options = self.client_options().await?;
        let client = Client::with_options(options)
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        self.client = Some(client);
        let status = self.health_check().await?;

        info!(
            server_version = status.server_version.as_deref().unwrap_or("unknown"),
            response_time_ms = status.response_time_ms,
            "Successfully connected to MongoDB"
        );
        Ok(status)
    }

    /// Disconnect from MongoDB
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
    }

    /// Ping the server and read its version
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let client = self.get_client()?;
        let admin = client.database("admin");

        let started = Instant::now();
        admin
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConnectionError::PingFailed(e.to_string()))?;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let server_version = admin
            .run_command(doc! { "buildInfo": 1 })
            .await
            .ok()
            .and_then(|info| info.get_str("version").ok().map(str::to_string));

        Ok(HealthStatus {
            response_time_ms,
            server_version,
        })
    }

    /// Get a collection handle
    ///
    /// # Arguments
    /// * `database` - Database name
    /// * `collection` - Collection name
    pub fn get_collection(&self, database: &str, collection: &str) -> Result<Collection<Document>> {
        Ok(self.get_client()?.database(database).collection(collection))
    }

    /// Get the MongoDB client
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Parse the URI and apply timeouts from configuration
    async fn client_options(&self) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| ConnectionError::InvalidUri(e.to_string()))?;

        let timeout = self.config.timeout_duration();
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        if options.app_name.is_none() {
            options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        }

        Ok(options)
    }
}
