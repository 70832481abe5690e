//! Main copy engine implementation

use crate::handle::HandleTable;
use crate::operation::{Limits, OperationContext, OperationState};
use crate::reporter::{spawn_dispatcher, EventReceiver, Reporter};
use crate::task::{CopyRequest, OperationId, OperationReport, OperationStatus};
use crate::verify::Verifier;
use ferrocopy_config::{Config, ConfigBuilder};
use ferrocopy_device::{BufferStrategy, DeviceProfiler};
use ferrocopy_types::{Cancellable, CopyMode, DeviceInfo, Error, ProgressReporter, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct OperationEntry {
    state: Arc<OperationState>,
    /// Taken by the first `wait`
    task: Option<JoinHandle<OperationReport>>,
    /// Flips to true once the task has finished. Also closes if it panicked.
    done: watch::Receiver<bool>,
}

struct EngineInner {
    config: Config,
    runtime: RuntimeHandle,
    profiler: Arc<DeviceProfiler>,
    strategy: Arc<BufferStrategy>,
    limits: Arc<Limits>,
    operations: Mutex<HandleTable<OperationEntry>>,
    shut_down: AtomicBool,
}

/// Main copy engine that owns and schedules copy operations
///
/// Cloning an engine is cheap; every clone refers to the same operation table.
#[derive(Clone)]
pub struct CopyEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for CopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyEngine")
            .field("operations", &self.table().len())
            .field("shut_down", &self.inner.shut_down.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl CopyEngine {
    /// Create an engine on the current tokio runtime
    pub fn new(config: Config) -> Result<Self> {
        let runtime = RuntimeHandle::try_current()
            .map_err(|e| Error::generic(format!("no tokio runtime available: {}", e)))?;
        Self::with_runtime(config, runtime)
    }

    /// Create an engine whose operations run on `runtime`
    pub fn with_runtime(config: Config, runtime: RuntimeHandle) -> Result<Self> {
        ConfigBuilder::validate(&config)?;
        let limits = Limits::new(
            config.performance.max_concurrent_operations,
            config.performance.max_total_workers,
        );
        let profiler = DeviceProfiler::with_cache_ttl(config.device.cache_ttl());
        let strategy = BufferStrategy::new(config.performance.tuning.clone());

        info!(
            "Copy engine initialized: {} concurrent operations, {} workers",
            config.performance.max_concurrent_operations, config.performance.max_total_workers
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                runtime,
                profiler: Arc::new(profiler),
                strategy: Arc::new(strategy),
                limits: Arc::new(limits),
                operations: Mutex::new(HandleTable::new()),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Profile the device holding `path`
    pub async fn device_info(&self, path: impl AsRef<Path>) -> Result<DeviceInfo> {
        self.inner.profiler.profile(path).await
    }

    /// Submit a request without event delivery
    pub fn submit(&self, request: CopyRequest) -> Result<OperationId> {
        self.start(request, Reporter::disabled(), None)
    }

    /// Submit a request whose events are delivered to `observer` from a
    /// dedicated task. The observer must not call back into this engine.
    pub fn submit_with_observer(
        &self,
        request: CopyRequest,
        observer: Arc<dyn ProgressReporter>,
    ) -> Result<OperationId> {
        let (reporter, receiver) = self.reporter();
        self.start(request, reporter, Some((receiver, observer)))
    }

    /// Submit a request and receive its events through a pollable queue
    pub fn submit_with_events(&self, request: CopyRequest) -> Result<(OperationId, EventReceiver)> {
        let (reporter, receiver) = self.reporter();
        let id = self.start(request, reporter, None)?;
        Ok((id, receiver))
    }

    /// Submit and wait
    pub async fn execute(&self, request: CopyRequest) -> Result<OperationReport> {
        let id = self.submit(request)?;
        self.wait(id).await
    }

    /// Wait for an operation to finish and release it from the table
    pub async fn wait(&self, id: OperationId) -> Result<OperationReport> {
        let task = {
            let mut table = self.table();
            let entry = table.get_mut(id).ok_or_else(|| unknown_operation(id))?;
            entry
                .task
                .take()
                .ok_or_else(|| Error::invalid_argument(format!("operation {} is already being awaited", id)))?
        };
        let report = task
            .await
            .map_err(|e| Error::generic(format!("operation {} task failed: {}", id, e)));
        self.table().remove(id);
        report
    }

    /// Request cooperative cancellation
    pub fn cancel(&self, id: OperationId) -> Result<()> {
        let state = {
            let table = self.table();
            let entry = table.get(id).ok_or_else(|| unknown_operation(id))?;
            Arc::clone(&entry.state)
        };
        debug!("Cancelling operation {}", id);
        state.cancel();
        Ok(())
    }

    /// Live status of an operation
    pub fn status(&self, id: OperationId) -> Result<OperationStatus> {
        let table = self.table();
        let entry = table.get(id).ok_or_else(|| unknown_operation(id))?;
        Ok(entry.state.status())
    }

    /// Identifiers of all operations not yet awaited
    pub fn list_operations(&self) -> Vec<OperationId> {
        self.table().handles()
    }

    /// Cancel every operation and wait for all of them to stop.
    /// Further submissions fail. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = self.table().drain();
        if !entries.is_empty() {
            info!("Shutting down with {} outstanding operations", entries.len());
        }
        for (_, entry) in &entries {
            entry.state.cancel();
        }
        for (id, mut entry) in entries {
            if let Some(task) = entry.task {
                if let Err(e) = task.await {
                    warn!("Operation {} ended abnormally: {}", id, e);
                }
            }
            // a concurrent wait() may hold the task handle
            let _ = entry.done.wait_for(|done| *done).await;
        }
        info!("Copy engine stopped");
    }

    /// Whether [`CopyEngine::shutdown`] was called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn table(&self) -> MutexGuard<'_, HandleTable<OperationEntry>> {
        self.inner
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reporter(&self) -> (Reporter, EventReceiver) {
        let reporting = &self.inner.config.reporting;
        Reporter::channel(reporting.event_queue_capacity, reporting.progress_interval())
    }

    fn start(
        &self,
        request: CopyRequest,
        reporter: Reporter,
        observer: Option<(EventReceiver, Arc<dyn ProgressReporter>)>,
    ) -> Result<OperationId> {
        if self.is_shut_down() {
            return Err(Error::invalid_argument("engine has been shut down"));
        }
        validate_paths(&request)?;

        let config = &self.inner.config;
        let state = Arc::new(OperationState::new());
        let (done_tx, done) = watch::channel(false);

        // Insert and spawn under one lock so shutdown either rejects this
        // submission or drains an entry that already owns its task.
        let mut table = self.table();
        if self.is_shut_down() {
            return Err(Error::invalid_argument("engine has been shut down"));
        }
        let id = table
            .insert(OperationEntry {
                state: Arc::clone(&state),
                task: None,
                done,
            })
            .ok_or_else(|| Error::out_of_memory("operation table is full"))?;

        let context = Arc::new(OperationContext {
            id,
            policy: request.policy.clone().unwrap_or_else(|| config.policy.clone()),
            request,
            compression: config.compression.clone(),
            verifier: Verifier::new(config.verification.algorithm),
            profiler: Arc::clone(&self.inner.profiler),
            strategy: Arc::clone(&self.inner.strategy),
            limits: Arc::clone(&self.inner.limits),
            reporter,
            state,
        });

        let dispatcher = observer.map(|(receiver, observer)| spawn_dispatcher(&self.inner.runtime, receiver, observer));
        let task = self.inner.runtime.spawn(async move {
            let report = context.run().await;
            if let Some(dispatcher) = dispatcher {
                // observers see every event before wait() returns
                let _ = dispatcher.await;
            }
            let _ = done_tx.send(true);
            report
        });

        if let Some(entry) = table.get_mut(id) {
            entry.task = Some(task);
        }
        drop(table);
        debug!("Submitted operation {}", id);
        Ok(id)
    }
}

fn unknown_operation(id: OperationId) -> Error {
    Error::invalid_argument(format!("unknown operation {}", id))
}

/// Mode-specific preconditions checked before any operation exists
fn validate_paths(request: &CopyRequest) -> Result<()> {
    request.validate()?;

    let source = &request.source;
    let source_meta = std::fs::symlink_metadata(source)
        .map_err(|_| Error::invalid_path(source, "source does not exist"))?;
    let destination_meta = std::fs::metadata(&request.destination).ok();

    let source_abs = absolute(source);
    let destination_abs = absolute(&request.destination);
    if source_abs == destination_abs {
        return Err(Error::invalid_argument("source and destination are the same path"));
    }

    let source_is_dir = source_meta.is_dir()
        || (source_meta.file_type().is_symlink() && std::fs::metadata(source).is_ok_and(|m| m.is_dir()));
    if source_is_dir {
        if destination_abs.starts_with(&source_abs) {
            return Err(Error::invalid_argument("destination is inside the source directory"));
        }
        if destination_meta.as_ref().is_some_and(|m| !m.is_dir()) {
            return Err(Error::invalid_argument(
                "cannot copy a directory onto an existing file",
            ));
        }
    }

    if request.mode == CopyMode::Sync && destination_meta.as_ref().is_some_and(|m| !m.is_dir()) {
        return Err(Error::invalid_argument("sync destination must be a directory"));
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    // not created yet: canonicalize the parent and re-attach the name
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            absolute(parent).join(name)
        }
        _ => std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path)),
    }
}
