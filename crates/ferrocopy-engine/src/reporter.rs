//! Progress and error event delivery
//!
//! Workers push events into a bounded queue and never wait on the consumer.
//! When the queue is full the oldest progress event is dropped; error events
//! are never dropped or coalesced. Progress pushes are additionally rate
//! limited by [`Reporter`] so a fast transfer does not flood the queue.
//!
//! The queue is drained either by a dispatcher task that calls a
//! [`ProgressReporter`] or directly by the caller through [`EventReceiver`].

use ferrocopy_types::{CopyStats, ErrorRecord, ProgressEvent, ProgressReporter};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;

/// Event emitted by a running operation
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Progress update
    Progress(ProgressEvent),
    /// Per-file or operation-wide error
    Error(ErrorRecord),
    /// Final statistics; always the last event
    Completed(CopyStats),
}

#[derive(Debug, Default)]
struct QueueState {
    events: VecDeque<EngineEvent>,
    last_progress_bytes: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: EngineEvent) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        if let EngineEvent::Progress(progress) = &event {
            // concurrent workers may snapshot counters out of order
            if progress.bytes_copied < state.last_progress_bytes {
                return;
            }
            state.last_progress_bytes = progress.bytes_copied;
        }

        if state.events.len() >= self.capacity {
            let oldest_progress = state
                .events
                .iter()
                .position(|e| matches!(e, EngineEvent::Progress(_)));
            match oldest_progress {
                Some(index) => {
                    state.events.remove(index);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                None if matches!(event, EngineEvent::Progress(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                None => {}
            }
        }
        state.events.push_back(event);
        drop(state);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }
}

/// Consumer side of an operation's event queue
#[derive(Debug)]
pub struct EventReceiver {
    shared: Arc<Shared>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once the operation has ended
    /// and every queued event was taken.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the next event without waiting
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.shared.lock().events.pop_front()
    }

    /// Progress events discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Producer side, shared by every worker of one operation
#[derive(Debug)]
pub struct Reporter {
    shared: Option<Arc<Shared>>,
    interval: Duration,
    origin: Instant,
    last_emit: AtomicU64,
    emitted: AtomicBool,
}

impl Reporter {
    /// A reporter that discards every event
    pub fn disabled() -> Self {
        Self::build(None, Duration::ZERO)
    }

    /// A reporter feeding a new bounded queue
    pub fn channel(capacity: usize, interval: Duration) -> (Self, EventReceiver) {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        });
        let receiver = EventReceiver {
            shared: Arc::clone(&shared),
        };
        (Self::build(Some(shared), interval), receiver)
    }

    fn build(shared: Option<Arc<Shared>>, interval: Duration) -> Self {
        Self {
            shared,
            interval,
            origin: Instant::now(),
            last_emit: AtomicU64::new(0),
            emitted: AtomicBool::new(false),
        }
    }

    /// Whether anyone is listening
    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Emit progress unless one was emitted less than the minimum interval ago.
    /// `event` is only built when the event will be queued.
    pub fn progress(&self, event: impl FnOnce() -> ProgressEvent) {
        let Some(shared) = &self.shared else {
            return;
        };
        let now = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        if self.emitted.load(Ordering::Acquire) {
            let last = self.last_emit.load(Ordering::Acquire);
            let interval = u64::try_from(self.interval.as_nanos()).unwrap_or(u64::MAX);
            if now.saturating_sub(last) < interval {
                return;
            }
            if self
                .last_emit
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // another worker won this slot
                return;
            }
        } else {
            self.last_emit.store(now, Ordering::Release);
            self.emitted.store(true, Ordering::Release);
        }
        shared.push(EngineEvent::Progress(event()));
    }

    /// Emit progress regardless of the rate limit
    pub fn force_progress(&self, event: ProgressEvent) {
        if let Some(shared) = &self.shared {
            shared.push(EngineEvent::Progress(event));
        }
    }

    /// Emit an error record. Never dropped.
    pub fn error(&self, record: ErrorRecord) {
        if let Some(shared) = &self.shared {
            trace!("Queueing error event: {}", record);
            shared.push(EngineEvent::Error(record));
        }
    }

    /// Emit the final statistics and close the queue
    pub fn complete(&self, stats: CopyStats) {
        if let Some(shared) = &self.shared {
            shared.push(EngineEvent::Completed(stats));
            shared.close();
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.close();
        }
    }
}

/// Drain `receiver` into `observer` on a dedicated task.
pub fn spawn_dispatcher(
    runtime: &tokio::runtime::Handle,
    mut receiver: EventReceiver,
    observer: Arc<dyn ProgressReporter>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                EngineEvent::Progress(progress) => observer.report_progress(&progress),
                EngineEvent::Error(record) => observer.report_error(&record),
                EngineEvent::Completed(stats) => observer.report_completion(&stats),
            }
        }
    })
}
