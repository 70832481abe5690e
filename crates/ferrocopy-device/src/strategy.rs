//! Buffer and worker selection
//!
//! The policy lives in a [`TuningTable`] (device class to buffer size and
//! thread cap) so it can be tested and overridden apart from the transfer
//! loop. Selection rules, in priority order:
//!
//! 1. explicit non-zero hints win;
//! 2. the buffer size comes from the table entry of the slower endpoint;
//! 3. the worker count follows the CPU count, capped by both endpoints'
//!    table entries (HDD and network entries cap it low).

use ferrocopy_config::TuningTable;
use ferrocopy_types::{BufferSize, DeviceInfo, DeviceType, Error, Result, ThreadCount};
use tracing::debug;

/// Caller-supplied overrides; zero means "choose automatically".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferHints {
    /// Worker count hint
    pub threads: u32,
    /// Chunk size hint in bytes
    pub buffer_size: u64,
}

impl TransferHints {
    /// Reject hints that can never be honored.
    pub fn validate(&self) -> Result<()> {
        if self.threads as usize > ThreadCount::MAX {
            return Err(Error::invalid_argument(format!(
                "thread hint {} exceeds maximum {}",
                self.threads,
                ThreadCount::MAX
            )));
        }
        if self.buffer_size != 0 {
            BufferSize::from_hint(self.buffer_size).map_err(Error::invalid_argument)?;
        }
        Ok(())
    }
}

/// Outcome of [`BufferStrategy::choose`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyDecision {
    /// Chunk size for reads and writes
    pub buffer_size: BufferSize,
    /// Worker count
    pub thread_count: ThreadCount,
    /// Class of the slower endpoint
    pub bottleneck: DeviceType,
    /// Theoretical MB/s of the slower endpoint, used for efficiency reporting
    pub theoretical_mbps: f64,
}

/// Picks buffer size and worker count from device profiles
#[derive(Debug, Clone)]
pub struct BufferStrategy {
    table: TuningTable,
    cpu_count: usize,
}

impl BufferStrategy {
    /// Strategy over `table` using the machine's available parallelism
    pub fn new(table: TuningTable) -> Self {
        Self::with_cpu_count(table, ThreadCount::optimal().get())
    }

    /// Strategy with an explicit CPU count
    pub fn with_cpu_count(table: TuningTable, cpu_count: usize) -> Self {
        Self {
            table,
            cpu_count: cpu_count.max(1),
        }
    }

    /// The tuning table in use
    pub const fn table(&self) -> &TuningTable {
        &self.table
    }

    /// Choose transfer parameters for a source/destination pair.
    pub fn choose(
        &self,
        source: &DeviceInfo,
        destination: &DeviceInfo,
        hints: TransferHints,
    ) -> Result<StrategyDecision> {
        hints.validate()?;
        let (bottleneck, theoretical_mbps) = bottleneck(source, destination);

        let buffer_size = if hints.buffer_size > 0 {
            BufferSize::from_hint(hints.buffer_size).map_err(Error::invalid_argument)?
        } else {
            self.table.get(bottleneck).buffer_size
        };

        let thread_count = if hints.threads > 0 {
            ThreadCount::saturating(hints.threads as usize)
        } else {
            let cap = self
                .thread_cap(source.device_type)
                .min(self.thread_cap(destination.device_type));
            ThreadCount::saturating(self.cpu_count.min(cap))
        };

        debug!(
            "Strategy {} -> {}: buffer={} threads={} bottleneck={}",
            source.device_type,
            destination.device_type,
            buffer_size.get(),
            thread_count.get(),
            bottleneck
        );

        Ok(StrategyDecision {
            buffer_size,
            thread_count,
            bottleneck,
            theoretical_mbps,
        })
    }

    fn thread_cap(&self, device_type: DeviceType) -> usize {
        match self.table.get(device_type).max_threads {
            0 => self.cpu_count,
            cap => cap,
        }
    }
}

impl Default for BufferStrategy {
    fn default() -> Self {
        Self::new(TuningTable::default())
    }
}

/// The slower endpoint of a transfer: source read speed against destination
/// write speed. Ties go to the destination.
pub fn bottleneck(source: &DeviceInfo, destination: &DeviceInfo) -> (DeviceType, f64) {
    if source.read_speed_mbps < destination.write_speed_mbps {
        (source.device_type, source.read_speed_mbps)
    } else {
        (destination.device_type, destination.write_speed_mbps)
    }
}
