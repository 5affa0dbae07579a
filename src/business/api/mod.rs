//! Remote panel API integration
//!
//! This module handles:
//! - Node config fetching
//! - User list fetching
//! - Traffic reporting

mod client;
mod models;

pub use client::{ApiManager, PanelApi, PanelConfig};
pub use models::{NodeInfo, UserInfo, UserTraffic};
