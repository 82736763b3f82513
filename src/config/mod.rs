// src/config/mod.rs
// DOCUMENTATION: Configuration module organization
// PURPOSE: Re-export configuration components

pub mod db;
pub mod discovery;
pub mod env;

pub use db::init_db_pool;
pub use discovery::{DiscoveryConfig, DiscoveryMode, SeedLocation, MAX_POLL_ATTEMPTS};
pub use env::{Config, ProviderMode, StoreBackend};
