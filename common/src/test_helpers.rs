/// Shared test utilities
///
/// Test data must not collide between concurrently running tests, so every
/// helper derives its output from a process-wide counter plus the wall clock.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_suffix() -> u64 {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    seq * 1_000_000_000 + nanos
}

/// Generate a unique identifier with the given prefix, e.g. "CANCEL-42-...".
pub fn generate_unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, next_suffix())
}

/// Generate a unique phone number in canonical national format.
pub fn unique_phone() -> String {
    // 05 + 8 digits keeps the value inside the canonical national format;
    // the counter alone guarantees process-wide uniqueness.
    format!("05{:08}", NEXT_ID.fetch_add(1, Ordering::Relaxed) % 100_000_000)
}
