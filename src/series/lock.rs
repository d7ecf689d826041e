//! Hook for an externally owned read/write lock.
//!
//! A series attached to a larger resource tree takes the tree's lock around
//! every operation. Guards release on drop, including on early return.

/// Read/write lock pair owned by the enclosing resource tree
pub trait TreeLock: Send + Sync {
    fn lock_read(&self);
    fn unlock_read(&self);
    fn lock_write(&self);
    fn unlock_write(&self);
}

/// Holds the tree read lock until dropped
pub struct TreeReadGuard<'a> {
    lock: &'a dyn TreeLock,
}

impl<'a> TreeReadGuard<'a> {
    pub fn acquire(lock: &'a dyn TreeLock) -> Self {
        lock.lock_read();
        Self { lock }
    }
}

impl Drop for TreeReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

/// Holds the tree write lock until dropped
pub struct TreeWriteGuard<'a> {
    lock: &'a dyn TreeLock,
}

impl<'a> TreeWriteGuard<'a> {
    pub fn acquire(lock: &'a dyn TreeLock) -> Self {
        lock.lock_write();
        Self { lock }
    }
}

impl Drop for TreeWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records lock calls in order
    #[derive(Default)]
    pub(crate) struct RecordingLock {
        pub(crate) calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingLock {
        pub(crate) fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TreeLock for RecordingLock {
        fn lock_read(&self) {
            self.calls.lock().unwrap().push("lock_read");
        }
        fn unlock_read(&self) {
            self.calls.lock().unwrap().push("unlock_read");
        }
        fn lock_write(&self) {
            self.calls.lock().unwrap().push("lock_write");
        }
        fn unlock_write(&self) {
            self.calls.lock().unwrap().push("unlock_write");
        }
    }

    #[test]
    fn test_guards_release_on_drop() {
        let lock = RecordingLock::default();
        {
            let _read = TreeReadGuard::acquire(&lock);
        }
        {
            let _write = TreeWriteGuard::acquire(&lock);
        }
        assert_eq!(
            lock.calls(),
            vec!["lock_read", "unlock_read", "lock_write", "unlock_write"]
        );
    }
}
