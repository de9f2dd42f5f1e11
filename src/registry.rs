//! Liveness registry for allocated buffers.
//!
//! Every non-empty aligned buffer registers its base address here with a
//! process-unique generation number and deregisters on drop. Plans capture
//! the generation of each bound buffer at creation time; debug builds
//! re-check the pair before every execution, which catches both plain
//! use-after-free and the address-reuse case where a freed allocation's
//! address comes back to life under a new owner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Generation 0 is reserved for untracked (empty) buffers; see [`is_live`].
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

static LIVE: OnceLock<Mutex<HashMap<usize, u64>>> = OnceLock::new();

fn live() -> &'static Mutex<HashMap<usize, u64>> {
    LIVE.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn register(addr: usize) -> u64 {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    live()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(addr, generation);
    generation
}

pub(crate) fn deregister(addr: usize) {
    live().lock().unwrap_or_else(|e| e.into_inner()).remove(&addr);
}

pub(crate) fn generation_of(addr: usize) -> Option<u64> {
    live()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&addr)
        .copied()
}

/// Whether the buffer registered at `addr` with `generation` is still alive.
///
/// Generation 0 marks an untracked binding and always passes.
pub(crate) fn is_live(addr: usize, generation: u64) -> bool {
    generation == 0 || generation_of(addr) == Some(generation)
}
