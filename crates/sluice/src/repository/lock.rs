// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::errors::RepositoryError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
#[derive(Debug, Default)]
struct LockState {
    owner: Option<String>,
    holds: u32,
}
/// Exclusive, owner-reentrant lock over one conversation. Waiters block
/// until the holder releases or the timeout elapses.
#[derive(Debug)]
pub struct FlowExecutionLock {
    conversation: String,
    state: Mutex<LockState>,
    released: Condvar,
    timeout: Duration,
}
impl FlowExecutionLock {
    pub fn new(conversation: impl Into<String>, timeout: Duration) -> Self {
        Self {
            conversation: conversation.into(),
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
            timeout,
        }
    }
    pub fn conversation(&self) -> &str {
        &self.conversation
    }
    pub fn owner(&self) -> Option<String> {
        self.state.lock().owner.clone()
    }
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }
    /// Acquires the lock for `owner`, returning a guard that releases it on
    /// drop. An owner that already holds the lock acquires it again.
    pub fn lock(self: &Arc<Self>, owner: &str) -> Result<FlowExecutionLockGuard, RepositoryError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut state = self.state.lock();
        loop {
            let holder = state.owner.clone();
            match holder {
                None => {
                    state.owner = Some(owner.to_string());
                    state.holds = 1;
                    break;
                }
                Some(holder) if holder == owner => {
                    state.holds += 1;
                    break;
                }
                Some(holder) => {
                    if self.released.wait_until(&mut state, deadline).timed_out()
                        && state.owner.is_some()
                    {
                        return Err(RepositoryError::LockTimeout {
                            conversation: self.conversation.clone(),
                            owner: holder,
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                }
            }
        }
        debug!(conversation = %self.conversation, owner = owner, "Conversation locked");
        Ok(FlowExecutionLockGuard {
            lock: Arc::clone(self),
            owner: owner.to_string(),
        })
    }
    pub fn unlock(&self, owner: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock();
        match state.owner.as_deref() {
            None => Err(RepositoryError::LockNotHeld {
                conversation: self.conversation.clone(),
            }),
            Some(current) if current != owner => Err(RepositoryError::InvalidLockOwner {
                expected: current.to_string(),
                actual: owner.to_string(),
            }),
            Some(_) => {
                state.holds = state.holds.saturating_sub(1);
                if state.holds == 0 {
                    state.owner = None;
                    self.released.notify_all();
                    debug!(conversation = %self.conversation, owner = owner, "Conversation unlocked");
                }
                Ok(())
            }
        }
    }
}
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FlowExecutionLockGuard {
    lock: Arc<FlowExecutionLock>,
    owner: String,
}
impl FlowExecutionLockGuard {
    pub fn owner(&self) -> &str {
        &self.owner
    }
}
impl Drop for FlowExecutionLockGuard {
    fn drop(&mut self) {
        if let Err(error) = self.lock.unlock(&self.owner) {
            warn!(error = %error, "Failed to release conversation lock");
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    #[test]
    fn reentrant_for_same_owner() {
        let lock = Arc::new(FlowExecutionLock::new("c1", Duration::from_millis(50)));
        let outer = lock.lock("a").unwrap();
        let inner = lock.lock("a").unwrap();
        drop(inner);
        assert!(lock.is_locked());
        drop(outer);
        assert!(!lock.is_locked());
    }
    #[test]
    fn other_owner_times_out() {
        let lock = Arc::new(FlowExecutionLock::new("c1", Duration::from_millis(30)));
        let _guard = lock.lock("a").unwrap();
        let contender = Arc::clone(&lock);
        let error = thread::spawn(move || contender.lock("b").map(|_| ()))
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(error, RepositoryError::LockTimeout { ref owner, .. } if owner == "a"));
    }
    #[test]
    fn waiter_acquires_after_release() {
        let lock = Arc::new(FlowExecutionLock::new("c1", Duration::from_secs(5)));
        let guard = lock.lock("a").unwrap();
        let contender = Arc::clone(&lock);
        let waiter = thread::spawn(move || contender.lock("b").map(|g| g.owner().to_string()));
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert_eq!(waiter.join().unwrap().unwrap(), "b");
    }
    #[test]
    fn unlock_by_wrong_owner_fails() {
        let lock = Arc::new(FlowExecutionLock::new("c1", Duration::from_millis(10)));
        let _guard = lock.lock("a").unwrap();
        assert!(matches!(
            lock.unlock("b"),
            Err(RepositoryError::InvalidLockOwner { .. })
        ));
    }
}
