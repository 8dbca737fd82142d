//! HTTP API for the dashboard.

pub mod server;
pub mod types;

pub use server::{AppState, start_server};
