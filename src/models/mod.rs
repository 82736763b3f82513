// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod flexible;
pub mod live_forecast;
pub mod search;
pub mod venue;
pub mod venue_filter;
pub mod week_raw;

pub use live_forecast::*;
pub use search::*;
pub use venue::*;
pub use venue_filter::*;
pub use week_raw::*;
