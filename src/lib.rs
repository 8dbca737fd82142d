//! bonkagent: HTTP gateway powering the BONK browser-agent dashboard.
//!
//! Fronts three upstream families behind one API surface: cloud
//! browser-automation tasks (Browser-Use), live browser sessions (Steel and
//! Browserbase), and read-only Solana wallet queries. The gateway holds at
//! most one supervised automation task at a time; everything else is a
//! stateless pass-through.

pub mod agent;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod sessions;
pub mod tasks;
pub mod wallet;
pub mod web;

pub use error::{Error, Result};
