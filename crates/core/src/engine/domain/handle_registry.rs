//! Generation-tagged arena that owns engine instances behind integer handles.
//!
//! A handle packs a slot index (low 32 bits, offset by one so no handle is
//! zero) and the slot's generation (high bits). Releasing a slot bumps its
//! generation, so a stale handle never resolves to the slot's next occupant.
//! Instances are reference counted: `release` unregisters immediately, but
//! the instance is dropped only when the last in-flight [`InstanceRef`] goes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Opaque handle value as seen by the host.
pub type Handle = u64;

/// Generations stay below 2^31 so handles fit a positive `i64`.
const MAX_GENERATION: u32 = i32::MAX as u32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid handle {0:#x}")]
pub struct InvalidHandle(pub Handle);

struct Entry<T> {
    instance: Mutex<T>,
    in_flight: AtomicUsize,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Arc<Entry<T>>>,
}

struct Table<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

/// A resolved handle, valid for the duration of one call.
///
/// Keeps the instance alive even if the handle is released meanwhile.
pub struct InstanceRef<T> {
    handle: Handle,
    entry: Arc<Entry<T>>,
}

impl<T> InstanceRef<T> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Run `f` with exclusive access to the instance.
    ///
    /// Calls on one instance are serialized. Returns `None` if an earlier
    /// call panicked while holding the instance.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.entry.instance.lock().ok()?;
        Some(f(&mut guard))
    }
}

impl<T> Drop for InstanceRef<T> {
    fn drop(&mut self) {
        self.entry.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct HandleRegistry<T> {
    table: Mutex<Table<T>>,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Register a fully constructed instance and return its handle.
    pub fn insert(&self, instance: T) -> Handle {
        let entry = Arc::new(Entry {
            instance: Mutex::new(instance),
            in_flight: AtomicUsize::new(0),
        });

        let mut table = self.lock_table();
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                table.slots.push(Slot {
                    generation: 1,
                    entry: None,
                });
                (table.slots.len() - 1) as u32
            }
        };
        let slot = &mut table.slots[index as usize];
        slot.entry = Some(entry);
        let handle = encode(index, slot.generation);
        table.live += 1;
        handle
    }

    /// Resolve a handle for one call, counting it as in flight.
    pub fn lookup(&self, handle: Handle) -> Result<InstanceRef<T>, InvalidHandle> {
        let table = self.lock_table();
        let entry = table.resolve(handle).ok_or(InvalidHandle(handle))?;
        entry.in_flight.fetch_add(1, Ordering::AcqRel);
        Ok(InstanceRef { handle, entry })
    }

    /// Unregister a handle. The instance is destroyed once no call holds it.
    pub fn remove(&self, handle: Handle) -> Result<(), InvalidHandle> {
        let entry = {
            let mut table = self.lock_table();
            table.resolve(handle).ok_or(InvalidHandle(handle))?;
            let (index, _) = decode(handle).ok_or(InvalidHandle(handle))?;

            let slot = &mut table.slots[index as usize];
            let entry = slot.entry.take();
            slot.generation += 1;
            // A slot whose generation is exhausted is retired, never reused.
            if slot.generation <= MAX_GENERATION {
                table.free.push(index);
            }
            table.live -= 1;
            entry
        };

        if let Some(entry) = &entry {
            let in_flight = entry.in_flight.load(Ordering::Acquire);
            if in_flight > 0 {
                log::debug!("Handle {handle:#x} released with {in_flight} call(s) in flight");
            }
        }
        // Dropped outside the table lock: teardown may be slow.
        drop(entry);
        Ok(())
    }

    /// Number of registered (not yet released) instances.
    pub fn live_count(&self) -> usize {
        self.lock_table().live
    }

    /// Calls currently holding the instance behind `handle`.
    pub fn in_flight(&self, handle: Handle) -> Option<usize> {
        let table = self.lock_table();
        table
            .resolve(handle)
            .map(|entry| entry.in_flight.load(Ordering::Acquire))
    }

    fn lock_table(&self) -> MutexGuard<'_, Table<T>> {
        // Table updates never panic halfway, so a poisoned table is still consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Table<T> {
    fn resolve(&self, handle: Handle) -> Option<Arc<Entry<T>>> {
        let (index, generation) = decode(handle)?;
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.entry.clone()
    }
}

fn encode(index: u32, generation: u32) -> Handle {
    ((generation as u64) << 32) | (index as u64 + 1)
}

fn decode(handle: Handle) -> Option<(u32, u32)> {
    let low = handle & 0xFFFF_FFFF;
    if low == 0 {
        return None;
    }
    Some(((low - 1) as u32, (handle >> 32) as u32))
}
