//! Core traits for ferrocopy operations
//!
//! Observers receive engine events through [`ProgressReporter`]; anything
//! that can be stopped cooperatively implements [`Cancellable`].

use crate::{CopyStats, ErrorRecord, ProgressEvent};

/// Receiver of events emitted by a running operation.
///
/// Implementations are invoked from a dispatcher task owned by the engine,
/// never from a transfer worker. They must not call back into the engine
/// that produced the event.
pub trait ProgressReporter: Send + Sync {
    /// Report progress information
    fn report_progress(&self, event: &ProgressEvent);

    /// Report an error that occurred during the operation
    fn report_error(&self, error: &ErrorRecord);

    /// Report completion of the operation
    fn report_completion(&self, _stats: &CopyStats) {}
}

/// Trait for operation cancellation
pub trait Cancellable {
    /// Request cancellation
    fn cancel(&self);

    /// Check if cancellation has been requested
    fn is_cancelled(&self) -> bool;
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report_progress(&self, _event: &ProgressEvent) {}

    fn report_error(&self, _error: &ErrorRecord) {}
}
