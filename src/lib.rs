// src/lib.rs
// DOCUMENTATION: Library root
// PURPOSE: Shared modules for the HTTP server and the refresh CLI

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
