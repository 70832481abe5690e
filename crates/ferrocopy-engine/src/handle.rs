//! Generation-checked handle table
//!
//! Handles are opaque non-zero `u64` values: the low 32 bits hold the slot
//! index plus one and the high 32 bits the slot generation. Removing an entry
//! bumps its slot's generation, so a handle kept past removal never resolves
//! to whatever later reuses the slot.

use std::fmt;
use std::num::NonZeroU64;

/// Opaque identifier issued by a [`HandleTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU64);

impl Handle {
    fn new(index: usize, generation: u32) -> Option<Self> {
        let slot = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU64::new((u64::from(generation) << 32) | u64::from(slot)).map(Self)
    }

    /// Rebuild a handle from its raw value. Zero is never a handle.
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Raw value, suitable for crossing an FFI boundary
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    fn index(self) -> Option<usize> {
        let slot = (self.0.get() & u64::from(u32::MAX)) as usize;
        slot.checked_sub(1)
    }

    const fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of values addressed by generation-checked [`Handle`]s
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store `value` and return its handle, or `None` when the index space
    /// is exhausted.
    pub fn insert(&mut self, value: T) -> Option<Handle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        let Some(handle) = Handle::new(index, slot.generation) else {
            self.free.push(index);
            return None;
        };
        slot.value = Some(value);
        self.len += 1;
        Some(handle)
    }

    fn slot(&self, handle: Handle) -> Option<&Slot<T>> {
        let slot = self.slots.get(handle.index()?)?;
        (slot.generation == handle.generation()).then_some(slot)
    }

    /// Look up a live entry
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    /// Look up a live entry mutably
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Whether `handle` names a live entry
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove an entry. Stale or unknown handles return `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        // generation 0 is skipped so a handle is never zero
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Remove every entry, invalidating all outstanding handles
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        let handles: Vec<Handle> = self.handles();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle).map(|value| (handle, value)))
            .collect()
    }

    /// Handles of all live entries
    pub fn handles(&self) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .filter_map(|(index, slot)| Handle::new(index, slot.generation))
            .collect()
    }

    /// Number of live entries
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the table is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
