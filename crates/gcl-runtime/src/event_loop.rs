//! Event loop implementation
//!
//! Single-threaded loop built around run-once idle handles.
//!
//! A handle is allocated with [`EventLoop::idle_init`], armed with
//! [`IdleHandle::start`] together with the task to run, and handed back to
//! that task when the loop fires it. The task then owns the handle again and
//! is expected to [`stop`](IdleHandle::stop) and [`close`](IdleHandle::close)
//! it. Tasks are boxed `FnOnce`-style values the loop moves out before
//! running, so a task can never run twice.
//!
//! ## Turn semantics
//!
//! [`EventLoop::run_once`] runs exactly the tasks that were armed before the
//! turn began. Anything armed while the turn is running waits for the next
//! turn, so a task is never observed running inside the call that armed it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::config::LoopConfig;
use crate::error::LoopError;

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(u64);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop-{}", self.0)
    }
}

/// Identity of an idle handle within its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    /// Allocated, not armed
    Inactive,
    /// Armed or currently firing
    Active,
    /// Disarmed, still allocated
    Stopped,
}

/// Work the loop runs once, handing back the handle it was armed with.
pub trait IdleTask: 'static {
    /// Run the task. Consumes it.
    fn run(self: Box<Self>, handle: IdleHandle);
}

impl<F> IdleTask for F
where
    F: FnOnce(IdleHandle) + 'static,
{
    fn run(self: Box<Self>, handle: IdleHandle) {
        (*self)(handle)
    }
}

struct Armed {
    handle: IdleHandle,
    task: Box<dyn IdleTask>,
}

/// Loop statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Completed turns
    pub turns: u64,
    /// Tasks run across all turns
    pub tasks_run: u64,
    /// Handles ever allocated
    pub handles_opened: u64,
    /// Handles closed (explicitly or on drop)
    pub handles_closed: u64,
}

struct LoopInner {
    id: LoopId,
    config: LoopConfig,
    handles: RefCell<FxHashMap<HandleId, HandleState>>,
    pending: RefCell<VecDeque<Armed>>,
    next_handle_id: Cell<u64>,
    stats: Cell<LoopStats>,
}

impl LoopInner {
    fn update_stats(&self, f: impl FnOnce(&mut LoopStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn release(&self, id: HandleId) -> bool {
        let removed = self.handles.borrow_mut().remove(&id).is_some();
        if removed {
            self.update_stats(|s| s.handles_closed += 1);
        }
        removed
    }
}

/// Event loop for idle tasks. Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Create a new event loop with custom limits
    pub fn with_config(config: LoopConfig) -> Self {
        let id = LoopId(NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(loop_id = %id, "event loop created");
        Self {
            inner: Rc::new(LoopInner {
                id,
                config,
                handles: RefCell::new(FxHashMap::default()),
                pending: RefCell::new(VecDeque::new()),
                next_handle_id: Cell::new(1),
                stats: Cell::new(LoopStats::default()),
            }),
        }
    }

    /// Loop identity
    pub fn id(&self) -> LoopId {
        self.inner.id
    }

    /// Allocate an inactive idle handle
    pub fn idle_init(&self) -> Result<IdleHandle, LoopError> {
        let mut handles = self.inner.handles.borrow_mut();
        if let Some(limit) = self.inner.config.max_handles {
            if handles.len() >= limit {
                return Err(LoopError::HandleLimit { limit });
            }
        }

        let id = HandleId(self.inner.next_handle_id.get());
        self.inner.next_handle_id.set(id.0 + 1);
        handles.insert(id, HandleState::Inactive);
        drop(handles);

        self.inner.update_stats(|s| s.handles_opened += 1);
        tracing::trace!(loop_id = %self.inner.id, handle = %id, "idle handle initialized");

        Ok(IdleHandle {
            id,
            owner: Some(Rc::downgrade(&self.inner)),
        })
    }

    /// Run `f` on a later turn. The handle is stopped and closed before `f` runs.
    pub fn queue_idle<F>(&self, f: F) -> Result<HandleId, LoopError>
    where
        F: FnOnce() + 'static,
    {
        let handle = self.idle_init()?;
        let id = handle.id();
        handle.start(move |mut handle: IdleHandle| {
            // A loop dropped mid-turn cannot be observed here; the handle is
            // being run by it.
            let _ = handle.stop();
            handle.close();
            f();
        })?;
        Ok(id)
    }

    /// Run one turn: every task armed before this call, in arming order.
    ///
    /// Returns the number of tasks run.
    pub fn run_once(&self) -> usize {
        let batch = mem::take(&mut *self.inner.pending.borrow_mut());
        let count = batch.len();

        for Armed { handle, task } in batch {
            tracing::trace!(loop_id = %self.inner.id, handle = %handle.id, "running idle task");
            task.run(handle);
        }

        self.inner.update_stats(|s| {
            s.turns += 1;
            s.tasks_run += count as u64;
        });
        count
    }

    /// Run turns until nothing is armed.
    ///
    /// Returns the number of tasks run.
    pub fn run(&self) -> usize {
        let mut total = 0;
        while self.has_pending_tasks() {
            total += self.run_once();
        }
        total
    }

    /// Whether any task is armed
    pub fn has_pending_tasks(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }

    /// Handles currently armed or firing
    pub fn active_handles(&self) -> usize {
        self.inner
            .handles
            .borrow()
            .values()
            .filter(|s| **s == HandleState::Active)
            .count()
    }

    /// Handles allocated and not yet closed
    pub fn open_handles(&self) -> usize {
        self.inner.handles.borrow().len()
    }

    /// Number of completed turns
    pub fn turn(&self) -> u64 {
        self.inner.stats.get().turns
    }

    /// Get statistics
    pub fn stats(&self) -> LoopStats {
        self.inner.stats.get()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("id", &self.inner.id)
            .field("open_handles", &self.open_handles())
            .field("pending", &self.inner.pending.borrow().len())
            .finish()
    }
}

/// Owned idle handle.
///
/// Not `Clone`: whoever holds it is the only one who can arm, stop or close
/// it. Dropping an unclosed handle closes it.
pub struct IdleHandle {
    id: HandleId,
    owner: Option<Weak<LoopInner>>,
}

impl IdleHandle {
    /// Handle identity
    pub fn id(&self) -> HandleId {
        self.id
    }

    fn owner(&self) -> Result<Rc<LoopInner>, LoopError> {
        self.owner
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(LoopError::LoopClosed)
    }

    /// Arm the handle. The loop keeps it, together with `task`, until the
    /// next turn hands both back by running the task.
    pub fn start<T: IdleTask>(self, task: T) -> Result<(), LoopError> {
        let inner = self.owner()?;
        {
            let mut handles = inner.handles.borrow_mut();
            let state = handles
                .get_mut(&self.id)
                .ok_or(LoopError::UnknownHandle(self.id))?;
            *state = HandleState::Active;
        }

        tracing::trace!(loop_id = %inner.id, handle = %self.id, "idle handle started");
        inner.pending.borrow_mut().push_back(Armed {
            handle: self,
            task: Box::new(task),
        });
        Ok(())
    }

    /// Disarm the handle. Stopping a handle that is not active is a no-op.
    pub fn stop(&mut self) -> Result<(), LoopError> {
        let inner = self.owner()?;
        let mut handles = inner.handles.borrow_mut();
        let state = handles
            .get_mut(&self.id)
            .ok_or(LoopError::UnknownHandle(self.id))?;
        if *state == HandleState::Active {
            *state = HandleState::Stopped;
            tracing::trace!(loop_id = %inner.id, handle = %self.id, "idle handle stopped");
        }
        Ok(())
    }

    /// Release the handle back to the loop
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) -> bool {
        let Some(owner) = self.owner.take() else {
            return false;
        };
        match owner.upgrade() {
            Some(inner) => {
                let released = inner.release(self.id);
                tracing::trace!(loop_id = %inner.id, handle = %self.id, "idle handle closed");
                released
            }
            None => false,
        }
    }
}

impl Drop for IdleHandle {
    fn drop(&mut self) {
        if self.owner.is_some() && self.release() {
            tracing::warn!(handle = %self.id, "idle handle dropped without being closed");
        }
    }
}

impl fmt::Debug for IdleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleHandle")
            .field("id", &self.id)
            .field("closed", &self.owner.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_init_counts_open_handles() {
        let event_loop = EventLoop::new();
        let handle = event_loop.idle_init().unwrap();
        assert_eq!(event_loop.open_handles(), 1);
        assert_eq!(event_loop.active_handles(), 0);

        handle.close();
        assert_eq!(event_loop.open_handles(), 0);
        assert_eq!(event_loop.stats().handles_closed, 1);
    }

    #[test]
    fn test_handle_limit() {
        let event_loop = EventLoop::with_config(LoopConfig {
            max_handles: Some(1),
        });
        let _first = event_loop.idle_init().unwrap();
        assert_eq!(
            event_loop.idle_init().err(),
            Some(LoopError::HandleLimit { limit: 1 })
        );
    }

    #[test]
    fn test_dropped_handle_is_released() {
        let event_loop = EventLoop::new();
        drop(event_loop.idle_init().unwrap());
        assert_eq!(event_loop.open_handles(), 0);
    }

    #[test]
    fn test_stop_after_loop_dropped() {
        let event_loop = EventLoop::new();
        let mut handle = event_loop.idle_init().unwrap();
        drop(event_loop);
        assert_eq!(handle.stop(), Err(LoopError::LoopClosed));
    }
}
