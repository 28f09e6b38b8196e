// Conference Admin - back office for the conference platform

// Core types and primitives
pub mod core;

// Infrastructure - document stores, caching, sessions and the auth client
pub mod infrastructure;

// Typed views over stored documents
pub mod models;

// Console operations
pub mod services;

// HTTP surface
pub mod admin_interface;
pub mod app_state;

// Common utilities
pub mod config;
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
