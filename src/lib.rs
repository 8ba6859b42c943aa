//! Lifecycle helpers shared by the uwhoisd services.
//!
//! - [`env`]: home directory, socket paths and directory creation
//! - [`registry`]: running-task registry, liveness pings and the shutdown flag
//! - [`waiter`]: long sleeps that stop early on shutdown
//! - [`store`]: async and blocking store connections the registry talks through

pub mod env;
pub mod errors;
pub mod registry;
pub mod signal_handler;
pub mod store;
pub mod waiter;

mod test_support;

pub use env::{get_storage_path, safe_create_dir, EnvConfig, Environment, Service};
pub use errors::{HelperError, Result};
pub use registry::{Registry, ShutdownProbe};
pub use waiter::{long_sleep, long_sleep_async, DEFAULT_SHUTDOWN_CHECK};
