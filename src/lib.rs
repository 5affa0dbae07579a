//! Shadowsocks node agent
//!
//! Architecture:
//! - `core/`: Engine-facing model, capability traits and in-process registry
//! - `business/`: Panel API, reconciliation, traffic collection, periodic tasks
//! - `config`, `logger`, `error`: Process configuration, logging and errors

pub mod business;
pub mod config;
pub mod core;
pub mod error;
pub mod logger;

pub use error::{EngineError, NodeError, Result};
