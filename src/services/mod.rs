// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod besttime_client;
pub mod fixture_client;
pub mod forecast_refresher;
pub mod refresher;
pub mod scheduler;
pub mod venue_service;

pub use besttime_client::*;
pub use fixture_client::*;
pub use forecast_refresher::*;
pub use refresher::*;
pub use scheduler::*;
pub use venue_service::*;
