//! The automation resource gate.
//!
//! A single worker loop owns the driver and runs one task at a time, in the
//! order the tasks were submitted. Callers talk to it through a cloneable
//! [`GateHandle`] and get their result back over a oneshot channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::driver::AutomationDriver;
use crate::error::FetchError;
use crate::metrics;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type GateTask = Box<dyn FnOnce(Arc<dyn AutomationDriver>) -> TaskFuture + Send>;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub enum GateCommand {
    Run {
        label: &'static str,
        task: GateTask,
    },
}

pub struct AutomationGate {
    driver: Arc<dyn AutomationDriver>,
    command_receiver: mpsc::Receiver<GateCommand>,
    shutdown_token: CancellationToken,
}

impl AutomationGate {
    pub fn new(
        driver: Arc<dyn AutomationDriver>,
        queue_capacity: usize,
        shutdown_token: CancellationToken,
    ) -> (Self, GateHandle) {
        let (command_tx, command_receiver) = mpsc::channel(queue_capacity.max(1));
        let gate = Self {
            driver,
            command_receiver,
            shutdown_token,
        };
        (gate, GateHandle { command_tx })
    }

    /// Starts the worker loop on the current runtime.
    pub fn spawn(driver: Arc<dyn AutomationDriver>, shutdown_token: CancellationToken) -> GateHandle {
        let (gate, handle) = Self::new(driver, DEFAULT_QUEUE_CAPACITY, shutdown_token);
        tokio::spawn(gate.run());
        handle
    }

    pub async fn run(mut self) {
        info!("Automation gate started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Automation gate received shutdown signal");
                    break;
                }
                command = self.command_receiver.recv() => {
                    match command {
                        Some(GateCommand::Run { label, task }) => {
                            let started = Instant::now();
                            debug!("Automation task '{}' acquired the session", label);
                            task(self.driver.clone()).await;
                            let elapsed = started.elapsed();
                            debug!("Automation task '{}' released the session after {:?}", label, elapsed);
                            metrics::record_automation_task(label, elapsed);
                        }
                        None => {
                            info!("All gate handles dropped, stopping automation gate");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Cloneable entry point to the gate.
#[derive(Clone)]
pub struct GateHandle {
    command_tx: mpsc::Sender<GateCommand>,
}

impl GateHandle {
    /// Queues `task` behind any in-flight task and runs it with sole access
    /// to the session.
    ///
    /// Dropping the returned future (for instance when an outer timeout
    /// fires) does not withdraw the task: it still runs when its turn comes,
    /// and its result is discarded.
    pub async fn run_exclusive<T, F, Fut>(&self, label: &'static str, task: F) -> Result<T, FetchError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn AutomationDriver>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        let task: GateTask = Box::new(move |driver| {
            Box::pin(async move {
                let result = task(driver).await;
                let _ = response_tx.send(result);
            })
        });

        self.command_tx
            .send(GateCommand::Run { label, task })
            .await
            .map_err(|_| FetchError::Upstream(anyhow!("Automation gate not available")))?;

        response_rx
            .await
            .map_err(|_| FetchError::Upstream(anyhow!("Automation gate dropped task '{}'", label)))?
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::driver::{
        PageHandle, SearchOptions, SessionCredentials, SessionHandle, StageProgressFn,
    };
    use crate::download::DownloadSetting;
    use crate::search::{SearchType, TrackCandidate};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct IdleDriver;

    #[async_trait]
    impl AutomationDriver for IdleDriver {
        async fn ensure_session_ready(
            &self,
            _credentials: Option<&SessionCredentials>,
        ) -> anyhow::Result<SessionHandle> {
            Ok(SessionHandle {
                session_id: "s".to_string(),
                page: PageHandle::new("p"),
            })
        }

        fn current_page(&self) -> anyhow::Result<PageHandle> {
            Ok(PageHandle::new("p"))
        }

        async fn search(
            &self,
            _page: &PageHandle,
            _query: &str,
            _search_type: SearchType,
            _options: SearchOptions,
        ) -> anyhow::Result<Vec<TrackCandidate>> {
            Ok(Vec::new())
        }

        async fn download_from_candidate(
            &self,
            _page: &PageHandle,
            _candidate: &TrackCandidate,
            _destination_dir: &Path,
            _setting: DownloadSetting,
            _on_progress: StageProgressFn,
        ) -> anyhow::Result<String> {
            Ok("file".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_one_at_a_time_in_fifo_order() {
        let gate = AutomationGate::spawn(Arc::new(IdleDriver), CancellationToken::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let gate = gate.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                gate.run_exclusive("test", move |_driver| async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    order.lock().unwrap().push(i);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
                .await
            }));
            // Submit in a deterministic order
            tokio::task::yield_now().await;
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), i);
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_is_propagated() {
        let gate = AutomationGate::spawn(Arc::new(IdleDriver), CancellationToken::new());
        let result: Result<(), _> = gate
            .run_exclusive("failing", |_driver| async {
                Err(FetchError::Conflict("busy".to_string()))
            })
            .await;
        assert!(matches!(result, Err(FetchError::Conflict(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_task_still_runs() {
        let gate = AutomationGate::spawn(Arc::new(IdleDriver), CancellationToken::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_clone = ran.clone();
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            gate.run_exclusive("orphan", move |_driver| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;
        assert!(waited.is_err());

        // The next task queues behind the orphan and observes its effect
        let seen = gate
            .run_exclusive("after", move |_driver| async move {
                Ok(ran.load(Ordering::SeqCst))
            })
            .await
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_gate() {
        let token = CancellationToken::new();
        let (gate, handle) = AutomationGate::new(Arc::new(IdleDriver), 4, token.clone());
        let worker = tokio::spawn(gate.run());

        token.cancel();
        worker.await.unwrap();

        let result: Result<(), _> = handle.run_exclusive("late", |_driver| async { Ok(()) }).await;
        assert!(matches!(result, Err(FetchError::Upstream(_))));
        assert!(handle.is_closed());
    }
}
