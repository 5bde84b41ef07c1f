//! Blocking adapter for completion-based I/O.
//!
//! The object-store client completes operations on an internal I/O thread
//! and signals a caller-provided completion. The forensic tools are
//! strictly sequential in program order, so every such operation is turned
//! into a synchronous call: submit with a fresh [`Completion`], then wait
//! on its condition variable until the completer stores a value. The
//! client's own submission lock and the completion's lock are never held
//! at the same time.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// A one-shot completion slot: a done-slot guarded by a mutex plus a
/// condition variable to wake the waiter.
pub struct Completion<T> {
    inner: Arc<(Mutex<Option<T>>, Condvar)>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    /// Create an empty completion.
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// Store the result and wake the waiter.
    ///
    /// A completion slot holds no invariants a panicking completer could
    /// break, so a poisoned lock is recovered rather than propagated.
    pub fn complete(&self, value: T) {
        let (slot, cvar) = &*self.inner;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(value);
        cvar.notify_all();
    }

    /// Block until a value is stored, then take it.
    pub fn wait(self) -> T {
        let (slot, cvar) = &*self.inner;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = guard.take() {
                return value;
            }
            guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Submit one operation and block the current thread until it completes.
pub fn block_on<T>(submit: impl FnOnce(Completion<T>)) -> T {
    let done = Completion::new();
    submit(done.clone());
    done.wait()
}
