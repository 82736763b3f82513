// src/db/mod.rs
// DOCUMENTATION: Cache store module organization
// PURPOSE: Re-export store backends and the venue DAO

pub mod memory_store;
pub mod postgres_store;
pub mod store;
pub mod venue_dao;

pub use memory_store::InMemoryGeoStore;
pub use postgres_store::PgGeoStore;
pub use store::GeoCacheStore;
pub use venue_dao::*;
