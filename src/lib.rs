pub mod auth;
pub mod billing;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod history;
pub mod metrics;
pub mod provider;
pub mod relay;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod usage;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use server::Server;
