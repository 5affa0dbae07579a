//! Business logic implementations
//!
//! This module contains the panel-driven logic:
//! - API integration (node config, user list, traffic report)
//! - Inbound descriptor building
//! - User reconciliation and traffic collection
//! - Periodic background tasks

pub mod adapter;
pub mod api;
pub mod inbound;
pub mod reconciler;
pub mod service;
pub mod tasks;
pub mod traffic;

pub use adapter::ProxyEngineAdapter;
pub use api::{ApiManager, NodeInfo, PanelApi, PanelConfig, UserInfo, UserTraffic};
pub use inbound::{build_inbound, listener_tag};
pub use reconciler::{diff, Reconciler, SyncReport, UserDelta, UserDirectory};
pub use service::NodeService;
pub use tasks::{BackgroundTasks, BackgroundTasksHandle, Periodic, TaskConfig};
pub use traffic::TrafficCollector;
