//! Thread-API classifier
//!
//! Name-based map from callee symbol to a thread-operation kind, plus the
//! argument-position accessors of the pthread calling conventions. The PAG
//! builder consumes Fork/Join; the remaining kinds are recognized for
//! downstream concurrency clients.

use crate::shared::models::{Module, ValueId};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Thread operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadOpKind {
    None,
    /// Create a new thread
    Fork,
    /// Wait for a thread to join
    Join,
    /// Detach a thread instead of joining it
    Detach,
    /// Acquire a lock
    Acquire,
    /// Try to acquire a lock
    TryAcquire,
    /// Release a lock
    Release,
    /// Exit/kill the current thread
    Exit,
    /// Cancel a thread from another
    Cancel,
    /// Wait on a condition
    CondWait,
    /// Signal a condition
    CondSignal,
    /// Broadcast a condition
    CondBroadcast,
    /// Initialize a mutex
    MutexInit,
    /// Destroy a mutex
    MutexDestroy,
    /// Initialize a condition variable
    CondvarInit,
    /// Destroy a condition variable
    CondvarDestroy,
}

static THREAD_TABLE: Lazy<FxHashMap<&'static str, ThreadOpKind>> = Lazy::new(|| {
    use ThreadOpKind::*;
    let entries: &[(&str, ThreadOpKind)] = &[
        ("pthread_create", Fork),
        ("pthread_join", Join),
        ("pthread_detach", Detach),
        ("pthread_mutex_lock", Acquire),
        ("pthread_mutex_trylock", TryAcquire),
        ("pthread_mutex_unlock", Release),
        ("pthread_rwlock_rdlock", Acquire),
        ("pthread_rwlock_wrlock", Acquire),
        ("pthread_rwlock_unlock", Release),
        ("pthread_exit", Exit),
        ("pthread_cancel", Cancel),
        ("pthread_kill", Cancel),
        ("pthread_cond_wait", CondWait),
        ("pthread_cond_timedwait", CondWait),
        ("pthread_cond_signal", CondSignal),
        ("pthread_cond_broadcast", CondBroadcast),
        ("pthread_mutex_init", MutexInit),
        ("pthread_mutex_destroy", MutexDestroy),
        ("pthread_cond_init", CondvarInit),
        ("pthread_cond_destroy", CondvarDestroy),
    ];
    entries.iter().copied().collect()
});

/// Classifier and accessor surface for thread-API callsites
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadApi;

impl ThreadApi {
    pub fn new() -> Self {
        Self
    }

    /// Classify a callee symbol; `None` kind for everything non-thread
    #[inline]
    pub fn classify(&self, name: &str) -> ThreadOpKind {
        THREAD_TABLE
            .get(name)
            .copied()
            .unwrap_or(ThreadOpKind::None)
    }

    #[inline]
    pub fn is_fork(&self, name: &str) -> bool {
        self.classify(name) == ThreadOpKind::Fork
    }

    #[inline]
    pub fn is_join(&self, name: &str) -> bool {
        self.classify(name) == ThreadOpKind::Join
    }

    // Fork-site accessors (pthread_create(tid, attr, routine, arg))

    /// First argument: the thread handle out-pointer
    pub fn forked_thread_arg(&self, args: &[ValueId]) -> Option<ValueId> {
        args.first().copied()
    }

    /// Third argument with constant casts stripped: the spawned routine
    pub fn forked_routine_arg(&self, module: &Module, args: &[ValueId]) -> Option<ValueId> {
        args.get(2).map(|v| module.strip_casts(*v))
    }

    /// Fourth argument: the sole actual parameter passed to the routine.
    ///
    /// The upstream accessor of the same name returned the routine operand
    /// instead; that behavior lives in `forked_routine_arg`. This one follows
    /// the documented convention (argument index 3).
    pub fn forked_actual_arg(&self, args: &[ValueId]) -> Option<ValueId> {
        args.get(3).copied()
    }

    // Join-site accessors (pthread_join(tid, retval_out))

    /// First argument: the joined thread handle
    pub fn joined_thread_arg(&self, args: &[ValueId]) -> Option<ValueId> {
        args.first().copied()
    }

    /// Second argument: the out-slot receiving the routine's return value
    pub fn joined_ret_arg(&self, args: &[ValueId]) -> Option<ValueId> {
        args.get(1).copied()
    }

    // Lock accessors

    /// First argument of the lock/unlock family
    pub fn lock_value(&self, args: &[ValueId]) -> Option<ValueId> {
        args.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ModuleBuilder;

    #[test]
    fn test_classify_fork_join() {
        let td = ThreadApi::new();
        assert_eq!(td.classify("pthread_create"), ThreadOpKind::Fork);
        assert_eq!(td.classify("pthread_join"), ThreadOpKind::Join);
        assert_eq!(td.classify("pthread_mutex_lock"), ThreadOpKind::Acquire);
        assert_eq!(td.classify("memcpy"), ThreadOpKind::None);
    }

    #[test]
    fn test_fork_accessors_strip_casts() {
        let mut mb = ModuleBuilder::new("m");
        let i8t = mb.types().int(8);
        let p8 = mb.types().pointer(i8t);
        let void = mb.types().void();
        let worker = mb.function("worker", void, &[p8], false, false);
        let worker_val = mb.func_value(worker);
        let casted = mb.const_cast(p8, worker_val);
        let tid = mb.null(p8);
        let attr = mb.null(p8);
        let arg = mb.null(p8);
        let m = mb.finish();

        let td = ThreadApi::new();
        let args = vec![tid, attr, casted, arg];
        assert_eq!(td.forked_routine_arg(&m, &args), Some(worker_val));
        assert_eq!(td.forked_actual_arg(&args), Some(arg));
        assert_eq!(td.forked_thread_arg(&args), Some(tid));
    }

    #[test]
    fn test_join_accessors() {
        let td = ThreadApi::new();
        let args = vec![7, 9];
        assert_eq!(td.joined_thread_arg(&args), Some(7));
        assert_eq!(td.joined_ret_arg(&args), Some(9));
        assert_eq!(td.joined_ret_arg(&args[..1]), None);
    }
}
