//! Background tasks for periodic user sync and traffic report

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::reconciler::Reconciler;
use super::traffic::TrafficCollector;
use crate::error::{NodeError, Result};
use crate::logger::log;

type Execute = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Background task configuration
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Interval for syncing users with the panel
    pub sync_users_interval: Duration,
    /// Interval for reporting traffic
    pub report_traffic_interval: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            sync_users_interval: Duration::from_secs(60),
            report_traffic_interval: Duration::from_secs(60),
        }
    }
}

impl TaskConfig {
    /// Create task config from durations
    pub fn new(sync_users: Duration, report_traffic: Duration) -> Self {
        Self {
            sync_users_interval: sync_users,
            report_traffic_interval: report_traffic,
        }
    }
}

/// A routine executed on a fixed interval.
///
/// An invocation never overlaps the previous one of the same routine: the
/// loop awaits each run inline and ticks that fall due meanwhile are skipped.
pub struct Periodic {
    name: &'static str,
    interval: Duration,
    execute: Execute,
    final_run: bool,
    running: Arc<AtomicBool>,
    worker: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Periodic {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, execute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            interval,
            execute: Arc::new(move || {
                Box::pin(execute()) as Pin<Box<dyn Future<Output = ()> + Send>>
            }),
            final_run: false,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Run the routine one more time when stopped
    pub fn with_final_run(mut self) -> Self {
        self.final_run = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// An invocation is in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.worker.is_some()
    }

    /// Arm the routine; the first run happens one interval from now
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(NodeError::Other(format!(
                "periodic {} already started",
                self.name
            )));
        }
        if self.interval.is_zero() {
            return Err(NodeError::Config(format!(
                "periodic {} needs a non-zero interval",
                self.name
            )));
        }

        let cancel_token = CancellationToken::new();
        let shutdown = cancel_token.clone();
        let name = self.name;
        let period = self.interval;
        let execute = Arc::clone(&self.execute);
        let running = Arc::clone(&self.running);
        let final_run = self.final_run;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        log::debug!(task = name, "Periodic task shutting down");
                        if final_run {
                            run_guarded(name, &running, &execute).await;
                        }
                        break;
                    }
                    _ = ticker.tick() => {
                        run_guarded(name, &running, &execute).await;
                    }
                }
            }
        });

        self.worker = Some((cancel_token, handle));
        log::debug!(task = name, interval_secs = period.as_secs(), "Periodic task started");
        Ok(())
    }

    /// Stop the routine, waiting for an in-flight run to finish
    pub async fn stop(&mut self) {
        let Some((cancel_token, handle)) = self.worker.take() else {
            return;
        };
        cancel_token.cancel();
        match handle.await {
            Ok(()) => log::debug!(task = self.name, "Periodic task stopped"),
            Err(e) => log::warn!(task = self.name, error = %e, "Periodic task panicked"),
        }
    }
}

impl Drop for Periodic {
    fn drop(&mut self) {
        if let Some((cancel_token, _)) = &self.worker {
            cancel_token.cancel();
        }
    }
}

async fn run_guarded(name: &'static str, running: &AtomicBool, execute: &Execute) {
    if running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        log::debug!(task = name, "Previous run still in flight, tick skipped");
        return;
    }
    execute().await;
    running.store(false, Ordering::Release);
}

/// Background tasks manager
pub struct BackgroundTasks {
    config: TaskConfig,
    reconciler: Arc<Reconciler>,
    collector: Arc<TrafficCollector>,
}

/// Handle for started background tasks
pub struct BackgroundTasksHandle {
    periodics: Vec<Periodic>,
}

impl BackgroundTasksHandle {
    /// Stop all background tasks and wait for them to complete
    pub async fn shutdown(mut self) {
        log::info!("Stopping background tasks...");
        for periodic in self.periodics.iter_mut() {
            periodic.stop().await;
        }
        log::info!("Background tasks stopped");
    }
}

impl BackgroundTasks {
    /// Create a new background tasks manager
    pub fn new(
        config: TaskConfig,
        reconciler: Arc<Reconciler>,
        collector: Arc<TrafficCollector>,
    ) -> Self {
        Self {
            config,
            reconciler,
            collector,
        }
    }

    /// Start all background tasks and return a handle for shutdown.
    ///
    /// Either every routine runs or none does: routines already started
    /// are stopped again before the error is returned.
    pub async fn start(self) -> Result<BackgroundTasksHandle> {
        let mut periodics = vec![self.sync_users_task(), self.report_traffic_task()];
        for i in 0..periodics.len() {
            if let Err(e) = periodics[i].start() {
                for started in periodics[..i].iter_mut() {
                    started.stop().await;
                }
                return Err(e);
            }
        }

        log::info!(
            sync_users_secs = self.config.sync_users_interval.as_secs(),
            report_traffic_secs = self.config.report_traffic_interval.as_secs(),
            "Background tasks started"
        );

        Ok(BackgroundTasksHandle { periodics })
    }

    fn sync_users_task(&self) -> Periodic {
        let reconciler = Arc::clone(&self.reconciler);
        Periodic::new("sync_users", self.config.sync_users_interval, move || {
            let reconciler = Arc::clone(&reconciler);
            async move {
                if let Err(e) = reconciler.reconcile().await {
                    log::error!(error = %e, "User sync failed");
                }
            }
        })
    }

    fn report_traffic_task(&self) -> Periodic {
        let collector = Arc::clone(&self.collector);
        Periodic::new(
            "report_traffic",
            self.config.report_traffic_interval,
            move || {
                let collector = Arc::clone(&collector);
                async move {
                    if let Err(e) = collector.collect_and_report().await {
                        log::error!(error = %e, "Failed to report traffic");
                    }
                }
            },
        )
        .with_final_run()
    }
}
