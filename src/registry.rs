//! Running-task registry and shutdown flag, both kept in database 2 of the
//! cache store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::env::{Environment, Service};
use crate::errors::Result;
use crate::store::{is_connection_error, BlockingStoreClient, StoreClient};

pub const REGISTRY_DB: i64 = 2;
pub const RUNNING_KEY: &str = "running";
pub const SHUTDOWN_KEY: &str = "shutdown";

/// Source of the "shutdown requested" answer polled by long sleeps.
#[async_trait]
pub trait ShutdownProbe: Send + Sync {
    async fn shutdown_requested(&self) -> bool;

    /// Same answer, for callers that block their own thread.
    fn shutdown_requested_blocking(&self) -> bool;
}

/// Opens a fresh connection to the cache store for every call.
#[derive(Debug, Clone)]
pub struct Registry {
    env: Environment,
}

impl Registry {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    async fn connect(&self) -> redis::RedisResult<StoreClient> {
        StoreClient::connect(self.env.socket_path(Service::Cache), REGISTRY_DB).await
    }

    pub async fn set_running(&self, name: &str) -> Result<()> {
        self.connect().await?.hset(RUNNING_KEY, name, "1").await?;
        log::debug!("{} marked as running", name);
        Ok(())
    }

    pub async fn unset_running(&self, name: &str) -> Result<()> {
        self.connect().await?.hdel(RUNNING_KEY, name).await?;
        log::debug!("{} no longer running", name);
        Ok(())
    }

    /// Every registered task and its stored marker.
    pub async fn is_running(&self) -> Result<HashMap<String, String>> {
        Ok(self.connect().await?.hgetall(RUNNING_KEY).await?)
    }

    /// Pings the socket of the service called `name`. Unreachable services are
    /// reported as not running; unknown service names are an error.
    pub async fn check_running(&self, name: &str) -> Result<bool> {
        let socket_path = self.env.socket_path(name.parse()?);

        let pinged = match StoreClient::connect(&socket_path, 0).await {
            Ok(mut client) => client.ping().await,
            Err(e) => Err(e),
        };
        match pinged {
            Ok(alive) => Ok(alive),
            Err(e) if is_connection_error(&e) => {
                log::debug!("{} is not answering: {}", name, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True when the shutdown key exists, and also when the store cannot be
    /// asked at all.
    pub async fn shutdown_requested(&self) -> bool {
        let exists = match self.connect().await {
            Ok(mut client) => client.exists(SHUTDOWN_KEY).await,
            Err(e) => Err(e),
        };
        match exists {
            Ok(requested) => requested,
            Err(e) => {
                log::warn!("Cannot read the shutdown flag, assuming shutdown: {}", e);
                true
            }
        }
    }

    /// Blocking form of [`Registry::shutdown_requested`], same polarity.
    pub fn shutdown_requested_blocking(&self) -> bool {
        let exists = BlockingStoreClient::connect(self.env.socket_path(Service::Cache), REGISTRY_DB)
            .and_then(|mut client| client.exists(SHUTDOWN_KEY));
        match exists {
            Ok(requested) => requested,
            Err(e) => {
                log::warn!("Cannot read the shutdown flag, assuming shutdown: {}", e);
                true
            }
        }
    }

    pub async fn request_shutdown(&self) -> Result<()> {
        self.connect().await?.set(SHUTDOWN_KEY, "1").await?;
        log::info!("Shutdown requested");
        Ok(())
    }

    pub async fn clear_shutdown(&self) -> Result<()> {
        self.connect().await?.del(SHUTDOWN_KEY).await?;
        log::info!("Shutdown flag cleared");
        Ok(())
    }
}

#[async_trait]
impl ShutdownProbe for Registry {
    async fn shutdown_requested(&self) -> bool {
        Registry::shutdown_requested(self).await
    }

    fn shutdown_requested_blocking(&self) -> bool {
        Registry::shutdown_requested_blocking(self)
    }
}
