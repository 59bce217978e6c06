//! Shared helpers for coral tests.
//!
//! Deterministic pseudo-random volumes and collision-free temp paths, used
//! by the streaming and driver test suites. Not part of the public API.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

static NEXT_PATH_ID: AtomicU64 = AtomicU64::new(0);

/// A unique path under the system temp directory.
///
/// Unique across threads (atomic counter) and processes (pid in the name).
/// The file is not created; callers that need cleanup should remove it
/// themselves.
pub fn temp_path(prefix: &str) -> PathBuf {
    let id = NEXT_PATH_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("coral-{prefix}-{}-{id}", std::process::id()))
}

/// A deterministic pseudo-random volume in `[0, 1)`.
///
/// Seeded ChaCha, so the same `(len, seed)` pair always yields the same
/// data — tests can regenerate an expected volume instead of storing it.
pub fn patterned_volume(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64)
        .collect()
}
