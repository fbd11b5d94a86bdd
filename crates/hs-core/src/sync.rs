//! Monitors behind `LOCK` / `UNLOCK`
//!
//! A [`LockRegistry`] maps lock keys to the VM that currently owns them.
//! Locks are not reentrant: a VM locking a key it already holds is an error
//! rather than a deadlock. A contended `LOCK` parks the calling thread until
//! the owner unlocks, optionally giving up after a timeout.
//!
//! The registry is shared between VMs through an `Arc`, one VM per thread.

use crate::heap::HeapRef;
use crate::vm::VmId;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Identity of a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Integer handle shared by convention between VMs
    Handle(i32),
    /// Heap object, scoped to the VM whose heap holds it
    Object(VmId, HeapRef),
}

/// Errors that can occur when using a lock
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The caller already holds the lock
    #[error("Lock {0:?} already held by this VM")]
    AlreadyLocked(LockKey),

    /// Unlock called by a VM that does not hold the lock
    #[error("Lock {0:?} is not held by this VM")]
    NotOwner(LockKey),

    /// The lock was not released in time
    #[error("Timed out waiting for lock {0:?}")]
    Timeout(LockKey),
}

/// Shared table of held locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Mutex<FxHashMap<LockKey, VmId>>,
    released: Condvar,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `key` for `owner`, blocking while another VM holds it
    pub fn lock(
        &self,
        key: LockKey,
        owner: VmId,
        timeout: Option<Duration>,
    ) -> Result<(), LockError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut held = self.held.lock();
        loop {
            match held.get(&key) {
                None => {
                    held.insert(key, owner);
                    return Ok(());
                }
                Some(current) if *current == owner => return Err(LockError::AlreadyLocked(key)),
                Some(_) => match deadline {
                    Some(deadline) => {
                        if self.released.wait_until(&mut held, deadline).timed_out()
                            && held.contains_key(&key)
                        {
                            return Err(LockError::Timeout(key));
                        }
                    }
                    None => self.released.wait(&mut held),
                },
            }
        }
    }

    /// Acquire `key` only if it is free
    ///
    /// Returns `Ok(false)` when another VM holds it.
    pub fn try_lock(&self, key: LockKey, owner: VmId) -> Result<bool, LockError> {
        let mut held = self.held.lock();
        match held.get(&key) {
            None => {
                held.insert(key, owner);
                Ok(true)
            }
            Some(current) if *current == owner => Err(LockError::AlreadyLocked(key)),
            Some(_) => Ok(false),
        }
    }

    /// Release `key`, which `owner` must hold
    pub fn unlock(&self, key: LockKey, owner: VmId) -> Result<(), LockError> {
        let mut held = self.held.lock();
        match held.get(&key) {
            Some(current) if *current == owner => {
                held.remove(&key);
                drop(held);
                self.released.notify_all();
                Ok(())
            }
            _ => Err(LockError::NotOwner(key)),
        }
    }

    /// Release every lock `owner` holds, returning how many were released
    pub fn release_all(&self, owner: VmId) -> usize {
        let mut held = self.held.lock();
        let before = held.len();
        held.retain(|_, current| *current != owner);
        let released = before - held.len();
        drop(held);
        if released > 0 {
            self.released.notify_all();
        }
        released
    }

    /// Current owner of `key`
    pub fn owner(&self, key: LockKey) -> Option<VmId> {
        self.held.lock().get(&key).copied()
    }

    /// Check if `key` is held
    pub fn is_locked(&self, key: LockKey) -> bool {
        self.owner(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_uncontended_lock_unlock() {
        let registry = LockRegistry::new();
        let vm = VmId::new();
        let key = LockKey::Handle(1);

        registry.lock(key, vm, None).unwrap();
        assert_eq!(registry.owner(key), Some(vm));
        registry.unlock(key, vm).unwrap();
        assert!(!registry.is_locked(key));
    }

    #[test]
    fn test_not_reentrant() {
        let registry = LockRegistry::new();
        let vm = VmId::new();
        let key = LockKey::Handle(1);

        registry.lock(key, vm, None).unwrap();
        assert_eq!(registry.lock(key, vm, None), Err(LockError::AlreadyLocked(key)));
        assert_eq!(registry.try_lock(key, vm), Err(LockError::AlreadyLocked(key)));
    }

    #[test]
    fn test_unlock_by_non_owner() {
        let registry = LockRegistry::new();
        let (a, b) = (VmId::new(), VmId::new());
        let key = LockKey::Handle(9);

        assert_eq!(registry.unlock(key, a), Err(LockError::NotOwner(key)));
        registry.lock(key, a, None).unwrap();
        assert_eq!(registry.unlock(key, b), Err(LockError::NotOwner(key)));
        assert!(!registry.try_lock(key, b).unwrap());
    }

    #[test]
    fn test_timeout() {
        let registry = LockRegistry::new();
        let (a, b) = (VmId::new(), VmId::new());
        let key = LockKey::Handle(2);

        registry.lock(key, a, None).unwrap();
        assert_eq!(
            registry.lock(key, b, Some(Duration::from_millis(10))),
            Err(LockError::Timeout(key))
        );
    }

    #[test]
    fn test_release_all() {
        let registry = LockRegistry::new();
        let (a, b) = (VmId::new(), VmId::new());
        registry.lock(LockKey::Handle(1), a, None).unwrap();
        registry.lock(LockKey::Handle(2), a, None).unwrap();
        registry.lock(LockKey::Handle(3), b, None).unwrap();

        assert_eq!(registry.release_all(a), 2);
        assert!(!registry.is_locked(LockKey::Handle(1)));
        assert!(registry.is_locked(LockKey::Handle(3)));
    }

    #[test]
    fn test_contended_lock_waits_for_release() {
        let registry = Arc::new(LockRegistry::new());
        let (a, b) = (VmId::new(), VmId::new());
        let key = LockKey::Handle(5);
        registry.lock(key, a, None).unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.lock(key, b, Some(Duration::from_secs(10))))
        };

        thread::sleep(Duration::from_millis(20));
        registry.unlock(key, a).unwrap();
        waiter.join().unwrap().unwrap();
        assert_eq!(registry.owner(key), Some(b));
    }
}
