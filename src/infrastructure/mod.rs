//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Database: Local and remote state backends, reconciliation
//! - Adapters: Platform integrations

pub mod config;
pub mod database;
pub mod adapters;
