//! Copy operation state machine
//!
//! `Planning -> Traversing -> Transferring -> Verifying -> Finalizing`, ending
//! in `Completed`, `Failed` or `Cancelled`. Counters are atomics updated by
//! workers; the first stop reason recorded wins and cancels the shared token
//! every worker checks between chunks and between files.

use crate::plan::{self, EntryKind, Plan};
use crate::reporter::Reporter;
use crate::task::{CopyRequest, OperationId, OperationReport, OperationStatus};
use crate::transfer::{self, FileJob};
use crate::verify::Verifier;
use ferrocopy_config::{CompressionConfig, MoveFallback, OperationPolicy};
use ferrocopy_device::{BufferStrategy, DeviceProfiler, StrategyDecision};
use ferrocopy_types::{
    Cancellable, CopyMode, CopyStats, DeviceInfo, Error, ErrorRecord, OperationPhase, ProgressEvent,
    Result,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why an operation stopped early
#[derive(Debug, Clone)]
pub(crate) enum StopReason {
    Cancelled,
    Timeout(Duration),
    Fatal(Error),
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    /// Bytes read and written so far, capped per file at its planned size
    pub bytes_transferred: AtomicU64,
    /// Bytes of files counted in `files_copied`
    pub bytes_committed: AtomicU64,
    pub total_bytes: AtomicU64,
    pub files_copied: AtomicU64,
    pub directories_created: AtomicU64,
    pub files_skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl Counters {
    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Acquire)
    }

    pub fn add(counter: &AtomicU64, value: u64) -> u64 {
        counter.fetch_add(value, Ordering::AcqRel) + value
    }
}

/// State shared between an operation's task, its workers and the engine
#[derive(Debug)]
pub(crate) struct OperationState {
    phase: AtomicU8,
    pub counters: Counters,
    token: CancellationToken,
    stop: OnceLock<StopReason>,
}

impl OperationState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(OperationPhase::Planning as u8),
            counters: Counters::default(),
            token: CancellationToken::new(),
            stop: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> OperationPhase {
        OperationPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move to `phase` unless a terminal phase was already reached
    pub fn set_phase(&self, phase: OperationPhase) {
        let _ = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (!OperationPhase::from_u8(current).is_terminal()).then_some(phase as u8)
            });
    }

    /// Record why the operation stops and signal every worker.
    /// Returns false when another reason was recorded first.
    pub fn stop(&self, reason: StopReason) -> bool {
        let first = self.stop.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.get()
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn status(&self) -> OperationStatus {
        let c = &self.counters;
        OperationStatus {
            phase: self.phase(),
            bytes_copied: Counters::get(&c.bytes_transferred),
            total_bytes: Counters::get(&c.total_bytes),
            files_copied: Counters::get(&c.files_copied),
            errors: Counters::get(&c.errors),
        }
    }

    fn stats(&self) -> CopyStats {
        let c = &self.counters;
        CopyStats {
            files_copied: Counters::get(&c.files_copied),
            directories_created: Counters::get(&c.directories_created),
            bytes_copied: Counters::get(&c.bytes_committed),
            files_skipped: Counters::get(&c.files_skipped),
            errors: Counters::get(&c.errors),
            ..CopyStats::default()
        }
    }
}

impl Cancellable for OperationState {
    fn cancel(&self) {
        if !self.phase().is_terminal() && self.stop(StopReason::Cancelled) {
            info!("Cancellation requested");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.is_stopping()
    }
}

/// Engine-wide concurrency limits
#[derive(Debug)]
pub(crate) struct Limits {
    pub operations: Arc<Semaphore>,
    pub workers: Arc<Semaphore>,
    pub max_workers: usize,
}

impl Limits {
    pub fn new(max_operations: usize, max_workers: usize) -> Self {
        Self {
            operations: Arc::new(Semaphore::new(max_operations.max(1))),
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
            max_workers: max_workers.max(1),
        }
    }
}

/// Everything one operation needs, shared with its workers
pub(crate) struct OperationContext {
    pub id: OperationId,
    pub request: CopyRequest,
    pub policy: OperationPolicy,
    pub compression: CompressionConfig,
    pub verifier: Verifier,
    pub profiler: Arc<DeviceProfiler>,
    pub strategy: Arc<BufferStrategy>,
    pub limits: Arc<Limits>,
    pub reporter: Reporter,
    pub state: Arc<OperationState>,
}

#[derive(Debug, Default)]
struct Profiles {
    source: Option<DeviceInfo>,
    destination: Option<DeviceInfo>,
    theoretical_mbps: f64,
}

impl OperationContext {
    /// Drive the operation to a terminal phase
    pub async fn run(self: Arc<Self>) -> OperationReport {
        let started = Instant::now();
        info!(
            "Operation {} started: {} {} -> {}",
            self.id,
            self.request.mode,
            self.request.source.display(),
            self.request.destination.display()
        );

        let timer = self.request.timeout.map(|timeout| {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(timeout) => {
                        if state.stop(StopReason::Timeout(timeout)) {
                            warn!("Operation timed out after {:?}", timeout);
                        }
                    }
                    () = state.token().cancelled() => {}
                }
            })
        });

        let mut profiles = Profiles::default();
        let result = Arc::clone(&self).execute(&mut profiles).await;
        if let Some(timer) = timer {
            timer.abort();
        }

        let (phase, error) = match result {
            Ok(()) => (OperationPhase::Completed, None),
            Err(e) => {
                if e != Error::Cancelled {
                    self.state.stop(StopReason::Fatal(e));
                }
                match self.state.stop_reason() {
                    Some(StopReason::Timeout(timeout)) => {
                        let seconds = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
                        (OperationPhase::Cancelled, Some(Error::Timeout { seconds }))
                    }
                    Some(StopReason::Fatal(e)) => (OperationPhase::Failed, Some(e.clone())),
                    Some(StopReason::Cancelled) | None => (OperationPhase::Cancelled, Some(Error::Cancelled)),
                }
            }
        };

        if let Some(e) = &error {
            if !matches!(e, Error::Cancelled) {
                error!("Operation {} {}: {}", self.id, phase, e);
                self.record(e.clone(), None);
            }
        }

        let mut stats = self.state.stats();
        stats.finish(started.elapsed(), profiles.theoretical_mbps);
        self.state.set_phase(phase);

        let c = &self.state.counters;
        self.reporter.force_progress(ProgressEvent::new(
            Counters::get(&c.bytes_transferred),
            Counters::get(&c.total_bytes),
            &self.request.source,
        ));
        self.reporter.complete(stats.clone());

        info!(
            "Operation {} {}: {} files, {} bytes, {} skipped, {} errors in {:?}",
            self.id,
            phase,
            stats.files_copied,
            stats.bytes_copied,
            stats.files_skipped,
            stats.errors,
            stats.duration
        );

        OperationReport {
            id: self.id,
            phase,
            stats,
            error,
            source_device: profiles.source,
            destination_device: profiles.destination,
        }
    }

    async fn execute(self: Arc<Self>, profiles: &mut Profiles) -> Result<()> {
        let _slot = self.acquire(Arc::clone(&self.limits.operations), 1).await?;

        // Planning
        self.state.set_phase(OperationPhase::Planning);
        let source_device = self.profiler.profile(&self.request.source).await?;
        let destination_device = self.profiler.profile_nearest(&self.request.destination).await?;
        let decision = self
            .strategy
            .choose(&source_device, &destination_device, self.request.hints())?;
        profiles.theoretical_mbps = decision.theoretical_mbps;
        profiles.source = Some(source_device);
        profiles.destination = Some(destination_device.clone());

        let plan = self.plan().await?;
        for (e, path) in &plan.walk_errors {
            self.record(e.clone(), Some(path));
        }
        self.state
            .counters
            .total_bytes
            .store(plan.total_bytes, Ordering::Release);
        self.checkpoint()?;

        if self.request.mode == CopyMode::Move && self.try_rename(&plan).await? {
            self.state.set_phase(OperationPhase::Finalizing);
            return Ok(());
        }
        plan.check_space(&destination_device, self.request.compress)?;

        // Traversing
        self.state.set_phase(OperationPhase::Traversing);
        let jobs = self.traverse(&plan).await?;
        self.checkpoint()?;

        // Transferring
        self.state.set_phase(OperationPhase::Transferring);
        let workers = self.worker_count(&decision, jobs.len());
        let permits = self.acquire(Arc::clone(&self.limits.workers), workers).await?;
        debug!(
            "Transferring {} files with {} workers, {} byte buffers",
            jobs.len(),
            workers,
            decision.buffer_size.get()
        );
        let committed = transfer::transfer_all(&self, jobs, workers, decision.buffer_size).await;
        self.checkpoint()?;

        // Verifying
        let confirmed = if self.request.verify_copy {
            self.state.set_phase(OperationPhase::Verifying);
            let confirmed = transfer::verify_all(&self, committed, workers, decision.buffer_size).await;
            self.checkpoint()?;
            confirmed
        } else {
            committed
        };
        drop(permits);

        // Finalizing
        self.state.set_phase(OperationPhase::Finalizing);
        self.finalize(&plan, &confirmed).await;
        Ok(())
    }

    async fn acquire(&self, semaphore: Arc<Semaphore>, permits: usize) -> Result<OwnedSemaphorePermit> {
        let permits = u32::try_from(permits).unwrap_or(u32::MAX);
        tokio::select! {
            biased;
            () = self.state.token().cancelled() => Err(Error::Cancelled),
            permit = semaphore.acquire_many_owned(permits) => {
                permit.map_err(|_| Error::generic("engine is shutting down"))
            }
        }
    }

    fn worker_count(&self, decision: &StrategyDecision, jobs: usize) -> usize {
        decision
            .thread_count
            .get()
            .min(self.limits.max_workers)
            .min(jobs)
            .max(1)
    }

    async fn plan(&self) -> Result<Plan> {
        let source = self.request.source.clone();
        let destination = self.request.destination.clone();
        let mode = self.request.mode;
        let compress = self.request.compress;
        let policy = self.policy.clone();
        tokio::task::spawn_blocking(move || plan::build(&source, &destination, mode, compress, &policy))
            .await
            .map_err(|e| Error::generic(format!("planning task failed: {}", e)))?
    }

    pub fn checkpoint(&self) -> Result<()> {
        if self.state.is_stopping() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Emit a soft error record
    pub fn record(&self, error: Error, path: Option<&Path>) {
        let record = ErrorRecord::from_error(&error, path);
        warn!("{}", record);
        Counters::add(&self.state.counters.errors, 1);
        self.reporter.error(record);
    }

    /// Count a file as copied
    pub fn confirm(&self, job: &FileJob) {
        let c = &self.state.counters;
        Counters::add(&c.files_copied, 1);
        Counters::add(&c.bytes_committed, job.size);
    }

    /// Rename the whole source into place when the destination does not exist yet.
    async fn try_rename(&self, plan: &Plan) -> Result<bool> {
        if self.request.compress || tokio::fs::symlink_metadata(&plan.target).await.is_ok() {
            return Ok(false);
        }
        match rename_into(&self.request.source, &plan.target).await {
            Ok(()) => {
                let c = &self.state.counters;
                let files = plan.files().count() as u64;
                let directories = plan.directories().count() as u64;
                Counters::add(&c.files_copied, files);
                Counters::add(&c.directories_created, directories);
                Counters::add(&c.bytes_committed, plan.total_bytes);
                Counters::add(&c.bytes_transferred, plan.total_bytes);
                info!(
                    "Moved {} to {} by rename",
                    self.request.source.display(),
                    plan.target.display()
                );
                Ok(true)
            }
            Err(e) => match self.policy.move_fallback {
                MoveFallback::CopyThenDelete => {
                    debug!("Rename failed ({}), falling back to copy and delete", e);
                    Ok(false)
                }
                MoveFallback::Fail => Err(Error::generic(format!(
                    "cannot rename {} to {}: {}",
                    self.request.source.display(),
                    plan.target.display(),
                    e
                ))),
            },
        }
    }

    async fn traverse(&self, plan: &Plan) -> Result<Vec<FileJob>> {
        if plan.source_is_dir {
            self.ensure_root(&plan.target).await?;
        } else if let Some(parent) = plan.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::from_io(&e, parent))?;
        }

        let mut failed_dirs: Vec<&Path> = Vec::new();
        let mut jobs = Vec::new();
        for entry in &plan.entries {
            self.checkpoint()?;
            if failed_dirs.iter().any(|dir| entry.source.starts_with(dir)) {
                if matches!(entry.kind, EntryKind::File { .. }) {
                    Counters::add(&self.state.counters.files_skipped, 1);
                }
                continue;
            }
            match entry.kind {
                EntryKind::Directory => match self.ensure_dir(&entry.destination).await {
                    Ok(true) => {
                        Counters::add(&self.state.counters.directories_created, 1);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.record(e, Some(&entry.destination));
                        failed_dirs.push(&entry.source);
                    }
                },
                EntryKind::Symlink => self.skip(&entry.source, "symbolic link skipped"),
                EntryKind::Special => self.skip(&entry.source, "special file skipped"),
                EntryKind::File { size } if entry.identical => {
                    debug!("Unchanged: {} ({} bytes)", entry.source.display(), size);
                    Counters::add(&self.state.counters.files_skipped, 1);
                }
                EntryKind::File { size } => {
                    jobs.push(FileJob::new(entry.source.clone(), entry.destination.clone(), size));
                }
            }
        }
        Ok(jobs)
    }

    fn skip(&self, path: &Path, reason: &str) {
        Counters::add(&self.state.counters.files_skipped, 1);
        self.record(Error::generic(format!("{}: {}", reason, path.display())), Some(path));
    }

    async fn ensure_root(&self, root: &Path) -> Result<()> {
        match tokio::fs::metadata(root).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Error::invalid_path(root, "destination exists and is not a directory")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => tokio::fs::create_dir_all(root)
                .await
                .map_err(|e| Error::from_io(&e, root)),
            Err(e) => Err(Error::from_io(&e, root)),
        }
    }

    /// Create a destination directory. Returns whether it had to be created.
    async fn ensure_dir(&self, path: &Path) -> Result<bool> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(false),
            Ok(_) if self.request.mode == CopyMode::Sync => {
                tokio::fs::remove_file(path)
                    .await
                    .map_err(|e| Error::from_io(&e, path))?;
                create_dir(path).await
            }
            Ok(_) => Err(Error::invalid_path(path, "exists and is not a directory")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => create_dir(path).await,
            Err(e) => Err(Error::from_io(&e, path)),
        }
    }

    async fn finalize(&self, plan: &Plan, confirmed: &[FileJob]) {
        if self.request.mode == CopyMode::Sync && self.policy.delete_extraneous {
            for path in &plan.extraneous {
                debug!("Removing extraneous {}", path.display());
                if let Err(e) = remove_entry(path).await {
                    self.record(e, Some(path));
                }
            }
        }

        if self.request.mode == CopyMode::Move {
            for job in confirmed {
                if let Err(e) = tokio::fs::remove_file(&job.source).await {
                    self.record(Error::from_io(&e, &job.source), Some(&job.source));
                }
            }
            if plan.source_is_dir {
                let mut directories: Vec<&PathBuf> = plan.directories().map(|e| &e.source).collect();
                directories.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
                directories.push(&self.request.source);
                // directories still holding skipped or failed entries stay
                for dir in directories {
                    if let Err(e) = tokio::fs::remove_dir(dir).await {
                        debug!("Keeping source directory {}: {}", dir.display(), e);
                    }
                }
            }
        }
    }
}

async fn create_dir(path: &Path) -> Result<bool> {
    match tokio::fs::create_dir(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::from_io(&e, path)),
    }
}

/// Rename `source` to `target`, creating the parents of `target` first
async fn rename_into(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(source, target).await
}

async fn remove_entry(path: &Path) -> Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::from_io(&e, path)),
        _ => Ok(()),
    }
}
