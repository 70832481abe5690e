//! Per-file transfer and verification workers
//!
//! Each file is streamed in `buffer_size` chunks into a hidden sibling temp
//! file that is renamed over the destination after its last chunk, so the
//! destination name never holds a partial file. Workers pull files from a
//! shared queue; chunks of one file are always written in source order.

use crate::operation::{Counters, OperationContext, StopReason};
use ferrocopy_compression::FrameEncoder;
use ferrocopy_types::{BufferSize, CopyMode, Error, ProgressEvent, Result};
use filetime::FileTime;
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// One file scheduled for transfer
#[derive(Debug, Clone)]
pub(crate) struct FileJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Size observed during planning
    pub size: u64,
    /// Bytes already added to the transfer counter for this file
    credited: u64,
}

impl FileJob {
    pub fn new(source: PathBuf, destination: PathBuf, size: u64) -> Self {
        Self {
            source,
            destination,
            size,
            credited: 0,
        }
    }
}

/// Copy every job. Returns the jobs whose destination was committed.
pub(crate) async fn transfer_all(
    ctx: &Arc<OperationContext>,
    jobs: Vec<FileJob>,
    workers: usize,
    buffer: BufferSize,
) -> Vec<FileJob> {
    run_pool(ctx, jobs, workers, move |ctx, job| transfer_one(ctx, job, buffer)).await
}

/// Verify committed jobs, re-copying mismatches as the policy allows.
/// Returns the jobs confirmed identical.
pub(crate) async fn verify_all(
    ctx: &Arc<OperationContext>,
    jobs: Vec<FileJob>,
    workers: usize,
    buffer: BufferSize,
) -> Vec<FileJob> {
    run_pool(ctx, jobs, workers, move |ctx, job| verify_one(ctx, job, buffer)).await
}

async fn run_pool<F, Fut>(
    ctx: &Arc<OperationContext>,
    jobs: Vec<FileJob>,
    workers: usize,
    work: F,
) -> Vec<FileJob>
where
    F: Fn(Arc<OperationContext>, FileJob) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Option<FileJob>> + Send + 'static,
{
    let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let mut set = JoinSet::new();
    for _ in 0..workers.max(1) {
        let ctx = Arc::clone(ctx);
        let queue = Arc::clone(&queue);
        let work = work.clone();
        set.spawn(async move {
            let mut done = Vec::new();
            while !ctx.state.is_stopping() {
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some(job) = next else {
                    break;
                };
                if let Some(job) = work(Arc::clone(&ctx), job).await {
                    done.push(job);
                }
            }
            done
        });
    }

    let mut done = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(mut finished) => done.append(&mut finished),
            Err(e) => {
                error!("Worker failed: {}", e);
                ctx.state
                    .stop(StopReason::Fatal(Error::generic(format!("worker failed: {}", e))));
            }
        }
    }
    done
}

async fn transfer_one(ctx: Arc<OperationContext>, mut job: FileJob, buffer: BufferSize) -> Option<FileJob> {
    debug!(
        "Copying {} -> {} ({} bytes)",
        job.source.display(),
        job.destination.display(),
        job.size
    );
    match copy_file(&ctx, &mut job, buffer).await {
        Ok(()) => {
            if !ctx.request.verify_copy {
                ctx.confirm(&job);
            }
            Some(job)
        }
        Err(e) => {
            fail_file(&ctx, e, &job.source);
            None
        }
    }
}

async fn verify_one(ctx: Arc<OperationContext>, mut job: FileJob, buffer: BufferSize) -> Option<FileJob> {
    let mut retries = 0;
    loop {
        if ctx.state.is_stopping() {
            return None;
        }
        let matched = if ctx.request.compress {
            ctx.verifier.verify_framed(&job.source, &job.destination).await
        } else {
            ctx.verifier.verify(&job.source, &job.destination).await
        };

        match matched {
            Ok(true) => {
                debug!("Verified {}", job.destination.display());
                ctx.confirm(&job);
                return Some(job);
            }
            Ok(false) => {
                let mismatch = Error::Verification {
                    path: job.destination.clone(),
                };
                if ctx.policy.strict_verification {
                    discard(&job.destination).await;
                    ctx.state.stop(StopReason::Fatal(mismatch));
                    return None;
                }
                ctx.record(mismatch, Some(&job.destination));

                if retries >= ctx.policy.verification_retries {
                    discard(&job.destination).await;
                    return None;
                }
                retries += 1;
                warn!(
                    "Re-copying {} (attempt {}/{})",
                    job.source.display(),
                    retries,
                    ctx.policy.verification_retries
                );
                if let Err(e) = copy_file(&ctx, &mut job, buffer).await {
                    fail_file(&ctx, e, &job.source);
                    discard(&job.destination).await;
                    return None;
                }
            }
            Err(e) => {
                fail_file(&ctx, e, &job.destination);
                return None;
            }
        }
    }
}

/// Route a per-file failure: operation-wide conditions stop everything,
/// the rest are recorded and the operation moves on.
fn fail_file(ctx: &OperationContext, error: Error, path: &Path) {
    let fatal = error.is_operation_wide()
        || (ctx.policy.strict_compression && matches!(error, Error::Compression { .. }));
    match error {
        Error::Cancelled => {}
        error if fatal => {
            error!("Fatal error on {}: {}", path.display(), error);
            ctx.state.stop(StopReason::Fatal(error));
        }
        error => ctx.record(error, Some(path)),
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Cannot remove {}: {}", path.display(), e);
        }
    }
}

fn temp_path(ctx: &OperationContext, destination: &Path) -> Result<PathBuf> {
    let name = destination
        .file_name()
        .ok_or_else(|| Error::invalid_path(destination, "destination has no file name"))?;
    Ok(destination.with_file_name(format!(
        ".{}.ferrocopy-{:x}.tmp",
        name.to_string_lossy(),
        ctx.id.get()
    )))
}

async fn copy_file(ctx: &OperationContext, job: &mut FileJob, buffer: BufferSize) -> Result<()> {
    clear_directory_conflict(ctx, &job.destination).await?;

    let temp = temp_path(ctx, &job.destination)?;
    let written = write_temp(ctx, job, &temp, buffer).await;
    let committed = match written {
        Ok(()) => tokio::fs::rename(&temp, &job.destination)
            .await
            .map_err(|e| Error::from_io(&e, &job.destination)),
        Err(e) => Err(e),
    };
    if let Err(e) = committed {
        discard(&temp).await;
        return Err(e);
    }

    // sync diffs on mtime, so it always carries timestamps over
    if ctx.request.preserve_metadata || ctx.request.mode == CopyMode::Sync {
        if let Err(e) = preserve_metadata(&job.source, &job.destination, ctx.request.preserve_metadata).await {
            ctx.record(e, Some(&job.destination));
        }
    }
    Ok(())
}

async fn clear_directory_conflict(ctx: &OperationContext, destination: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(destination).await {
        Ok(metadata) if metadata.is_dir() => {
            if ctx.request.mode != CopyMode::Sync {
                return Err(Error::invalid_path(destination, "destination is a directory"));
            }
            tokio::fs::remove_dir_all(destination)
                .await
                .map_err(|e| Error::from_io(&e, destination))
        }
        _ => Ok(()),
    }
}

async fn write_temp(ctx: &OperationContext, job: &mut FileJob, temp: &Path, buffer: BufferSize) -> Result<()> {
    let source = job.source.clone();
    let destination = job.destination.clone();
    let source_err = |e: io::Error| Error::from_io(&e, &source);
    let destination_err = |e: io::Error| Error::from_io(&e, &destination);

    let mut reader = File::open(&source).await.map_err(source_err)?;
    let mut writer = File::create(temp).await.map_err(destination_err)?;

    let encoder = ctx
        .request
        .compress
        .then(|| FrameEncoder::new(ctx.compression.algorithm, ctx.compression.level));
    if let Some(encoder) = &encoder {
        writer.write_all(&encoder.header()).await.map_err(destination_err)?;
    }

    let chunk_len = buffer.for_file(job.size);
    #[cfg(target_os = "linux")]
    if encoder.is_none() {
        if let Some(copied) = kernel_copy(ctx, job, &reader, &writer, chunk_len).await {
            return copied;
        }
    }

    let mut chunk = vec![0u8; chunk_len];
    let mut read_total = 0u64;
    let mut compression_reported = false;
    loop {
        if ctx.state.is_stopping() {
            return Err(Error::Cancelled);
        }
        let n = read_chunk(&mut reader, &mut chunk).await.map_err(source_err)?;
        if n == 0 {
            break;
        }

        match &encoder {
            Some(encoder) => {
                let frame = encoder.encode(&chunk[..n])?;
                if let Some(failure) = frame.failure {
                    if ctx.policy.strict_compression {
                        return Err(failure);
                    }
                    if !compression_reported {
                        compression_reported = true;
                        ctx.record(failure, Some(&source));
                    }
                }
                writer.write_all(&frame.bytes).await.map_err(destination_err)?;
            }
            None => writer.write_all(&chunk[..n]).await.map_err(destination_err)?,
        }

        read_total += n as u64;
        credit(ctx, job, read_total);
    }

    writer.flush().await.map_err(destination_err)?;
    Ok(())
}

/// Copy in `chunk` sized steps with `copy_file_range` so the bytes never
/// pass through user space. Returns `None` before anything was copied when
/// the filesystems cannot do it, and the caller falls back to read/write.
#[cfg(target_os = "linux")]
async fn kernel_copy(
    ctx: &OperationContext,
    job: &mut FileJob,
    reader: &File,
    writer: &File,
    chunk: usize,
) -> Option<Result<()>> {
    use nix::errno::Errno;

    let source = Arc::new(reader.try_clone().await.ok()?.into_std().await);
    let target = Arc::new(writer.try_clone().await.ok()?.into_std().await);
    let mut total = 0u64;
    loop {
        if ctx.state.is_stopping() {
            return Some(Err(Error::Cancelled));
        }
        let (input, output) = (Arc::clone(&source), Arc::clone(&target));
        let offset = i64::try_from(total).unwrap_or(i64::MAX);
        let copied = tokio::task::spawn_blocking(move || {
            let (mut off_in, mut off_out) = (offset, offset);
            nix::fcntl::copy_file_range(&*input, Some(&mut off_in), &*output, Some(&mut off_out), chunk)
        })
        .await;

        let n = match copied {
            Ok(Ok(n)) => n,
            Ok(Err(Errno::EXDEV | Errno::ENOSYS | Errno::EINVAL | Errno::EOPNOTSUPP | Errno::EPERM))
                if total == 0 =>
            {
                debug!("copy_file_range unavailable for {}", job.source.display());
                return None;
            }
            Ok(Err(errno)) => return Some(Err(Error::from_io(&io::Error::from(errno), &job.destination))),
            Err(e) => return Some(Err(Error::generic(format!("copy task failed: {}", e)))),
        };
        if n == 0 {
            // some pseudo filesystems report 0 for files that do have data
            if total == 0 && job.size > 0 {
                return None;
            }
            return Some(Ok(()));
        }
        total += n as u64;
        credit(ctx, job, total);
    }
}

/// Fill `buffer` unless the reader hits end of file first
async fn read_chunk(reader: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Add newly transferred bytes to the counter. A retried file is only
/// credited past what earlier attempts already reported, and never past its
/// planned size.
fn credit(ctx: &OperationContext, job: &mut FileJob, read_total: u64) {
    let reached = read_total.min(job.size);
    if reached <= job.credited {
        return;
    }
    let delta = reached - job.credited;
    job.credited = reached;
    let counters = &ctx.state.counters;
    let copied = Counters::add(&counters.bytes_transferred, delta);
    ctx.reporter.progress(|| {
        ProgressEvent::new(
            copied,
            counters.total_bytes.load(std::sync::atomic::Ordering::Acquire),
            &job.source,
        )
    });
}

async fn preserve_metadata(source: &Path, destination: &Path, permissions: bool) -> Result<()> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| Error::from_io(&e, source))?;
    filetime::set_file_times(
        destination,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(|e| Error::from_io(&e, destination))?;

    #[cfg(unix)]
    if permissions {
        tokio::fs::set_permissions(destination, metadata.permissions())
            .await
            .map_err(|e| Error::from_io(&e, destination))?;
    }
    #[cfg(not(unix))]
    let _ = permissions;
    Ok(())
}
