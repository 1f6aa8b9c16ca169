//! Lock poisoning recovery for the shared record stores.
//!
//! A panic on one execution unit while it held a store lock must not take the
//! packet path down on every other unit. Store records are plain `Copy` values
//! written as a whole, so a recovered guard never exposes a half-updated record.

use std::sync::{Mutex, MutexGuard};
use tracing::error;

/// Acquire a store lock, recovering the guard if a previous holder panicked.
///
/// `store` names the protected store in the error log.
pub fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, store: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(
                "{} lock poisoned - recovering, records may be stale",
                store
            );
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_or_recover_normal_operation() {
        let mutex = Mutex::new(42);
        let guard = lock_or_recover(&mutex, "test store");
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_mutex_poisoning_recovery() {
        let mutex = Arc::new(Mutex::new(7u64));
        let mutex_clone = Arc::clone(&mutex);

        let handle = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("Intentional panic to poison the lock");
        });
        let _ = handle.join();

        {
            let mut guard = lock_or_recover(&mutex, "poisoned store");
            assert_eq!(*guard, 7);
            *guard += 1;
        }
        // poison flag is cleared after recovery
        assert!(!mutex.is_poisoned());
        assert_eq!(*mutex.lock().unwrap(), 8);
    }
}
