//! Node service lifecycle: initial sync, then periodic routines

use std::sync::Arc;

use super::adapter::ProxyEngineAdapter;
use super::api::{NodeInfo, PanelApi};
use super::inbound::listener_tag;
use super::reconciler::{Reconciler, SyncReport, UserDirectory};
use super::tasks::{BackgroundTasks, BackgroundTasksHandle, TaskConfig};
use super::traffic::TrafficCollector;
use crate::core::ProxyEngine;
use crate::error::{NodeError, Result};
use crate::logger::log;

/// Keeps one listener in sync with the panel for the process lifetime
pub struct NodeService {
    config: TaskConfig,
    reconciler: Arc<Reconciler>,
    collector: Arc<TrafficCollector>,
    tasks: Option<BackgroundTasksHandle>,
}

impl NodeService {
    /// Bind to the node's listener on `engine`.
    ///
    /// Fails when the listener is missing or cannot manage users.
    pub fn new(
        engine: Arc<dyn ProxyEngine>,
        api: Arc<dyn PanelApi>,
        node: &NodeInfo,
        config: TaskConfig,
    ) -> Result<Self> {
        let tag = listener_tag(node.server_port);
        let adapter = Arc::new(ProxyEngineAdapter::new(engine, &tag)?);
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&api),
            Arc::clone(&adapter),
            &node.cipher,
        ));
        let collector = Arc::new(TrafficCollector::new(api, adapter, reconciler.directory()));
        Ok(Self {
            config,
            reconciler,
            collector,
            tasks: None,
        })
    }

    /// Read-only handle to the synced user set
    pub fn directory(&self) -> UserDirectory {
        self.reconciler.directory()
    }

    pub fn is_started(&self) -> bool {
        self.tasks.is_some()
    }

    /// Initial full sync, then arm both periodic routines.
    ///
    /// The initial sync must fully succeed; the node does not serve from an
    /// unknown user set.
    pub async fn start(&mut self) -> Result<SyncReport> {
        if self.tasks.is_some() {
            return Err(NodeError::Other("node service already started".into()));
        }

        let report = self.reconciler.start().await?;
        log::info!(count = report.added, "Added new users");

        let tasks = BackgroundTasks::new(
            self.config.clone(),
            Arc::clone(&self.reconciler),
            Arc::clone(&self.collector),
        );
        self.tasks = Some(tasks.start().await?);
        Ok(report)
    }

    /// Stop both routines and wait for in-flight runs
    pub async fn close(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.shutdown().await;
        }
    }
}
