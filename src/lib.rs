pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod scrapers;
pub mod store;
