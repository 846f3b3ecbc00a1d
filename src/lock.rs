use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Lock `lock`, taking the inner value back if a panicking thread poisoned it.
/// The capture callback and the controller share small state slots; a poisoned
/// slot still holds usable data.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(context, "mutex poisoned; recovering");
        poisoned.into_inner()
    })
}
