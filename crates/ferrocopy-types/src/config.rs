//! Validated tuning values
//!
//! Buffer sizes and thread counts that come from configuration files go
//! through these newtypes so that a zero or absurd value never reaches the
//! transfer loop.

/// Buffer size configuration with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferSize(usize);

impl BufferSize {
    /// Minimum buffer size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum buffer size for tuning tables (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Largest explicit per-request hint accepted (1GB)
    pub const MAX_HINT: u64 = 1024 * 1024 * 1024;
    /// Default buffer size (1MB)
    pub const DEFAULT: usize = 1024 * 1024;

    /// Create a new buffer size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Buffer size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Buffer size {} exceeds maximum {}", size, Self::MAX))
        } else if !size.is_power_of_two() {
            Err(format!("Buffer size {} must be a power of two", size))
        } else {
            Ok(Self(size))
        }
    }

    /// Accept an explicit caller hint. Any non-zero value up to
    /// [`Self::MAX_HINT`] is honored as given.
    pub fn from_hint(size: u64) -> Result<Self, String> {
        if size == 0 {
            Err("Buffer size hint must be non-zero".to_string())
        } else if size > Self::MAX_HINT {
            Err(format!("Buffer size hint {} exceeds maximum {}", size, Self::MAX_HINT))
        } else {
            usize::try_from(size)
                .map(Self)
                .map_err(|_| format!("Buffer size hint {} does not fit in memory", size))
        }
    }

    /// Get the buffer size value
    pub const fn get(self) -> usize {
        self.0
    }

    /// Shrink the buffer for a file of `file_size` bytes, never below [`Self::MIN`].
    pub fn for_file(self, file_size: u64) -> usize {
        let wanted = usize::try_from(file_size).unwrap_or(usize::MAX).max(Self::MIN);
        self.0.min(wanted)
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Thread count configuration with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadCount(usize);

impl ThreadCount {
    /// Minimum thread count
    pub const MIN: usize = 1;
    /// Maximum thread count
    pub const MAX: usize = 256;

    /// Create a new thread count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Thread count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Thread count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Clamp any value into the valid range.
    pub fn saturating(count: usize) -> Self {
        Self(count.clamp(Self::MIN, Self::MAX))
    }

    /// Get the thread count value
    pub const fn get(self) -> usize {
        self.0
    }

    /// Get the optimal thread count for the current system
    pub fn optimal() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::saturating(cpu_count)
    }
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::optimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_buffer_size_validation() {
        assert!(BufferSize::new(4096).is_ok());
        assert!(BufferSize::new(1024 * 1024).is_ok());
        assert!(BufferSize::new(1024).is_err());
        assert!(BufferSize::new(5000).is_err());
        assert!(BufferSize::new(BufferSize::MAX * 2).is_err());
    }

    #[test]
    fn test_buffer_hint() {
        assert!(BufferSize::from_hint(0).is_err());
        assert_eq!(BufferSize::from_hint(12_345).unwrap().get(), 12_345);
        assert!(BufferSize::from_hint(BufferSize::MAX_HINT + 1).is_err());
    }

    #[test]
    fn test_buffer_for_small_file() {
        let buffer = BufferSize::new(1024 * 1024).unwrap();
        assert_eq!(buffer.for_file(0), BufferSize::MIN);
        assert_eq!(buffer.for_file(10_000), 10_000);
        assert_eq!(buffer.for_file(u64::MAX), 1024 * 1024);
    }

    #[test]
    fn test_thread_count_bounds() {
        assert!(ThreadCount::new(0).is_err());
        assert!(ThreadCount::new(257).is_err());
        assert_eq!(ThreadCount::saturating(0).get(), 1);
        assert_eq!(ThreadCount::saturating(10_000).get(), ThreadCount::MAX);
        assert!(ThreadCount::optimal().get() >= 1);
    }

    proptest! {
        #[test]
        fn test_for_file_never_zero(size in any::<u64>()) {
            let buffer = BufferSize::default();
            let chosen = buffer.for_file(size);
            prop_assert!(chosen >= BufferSize::MIN);
            prop_assert!(chosen <= buffer.get());
        }
    }
}
