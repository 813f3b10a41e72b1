// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread context pool with drain/block support.
//!
//! Every thread gets its own lazily opened [`Context`]. The pool also owns the
//! blocking state, because "hand out a context" and "refuse while blocked"
//! have to be decided under one lock.
//!
//! A thread that already holds a usage keeps being served its in-flight
//! context, even while another thread is blocking. That lets outstanding work
//! finish so the drain can complete.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use tempo_core::TempoError;

use crate::context::{Context, ContextSettings};
use crate::stats::{DatabaseStats, recording};

/// Marker that keeps a type on the thread that created it.
pub(crate) type NotSend = PhantomData<*const ()>;

pub(crate) struct ContextPool {
    settings: ContextSettings,
    stats: Arc<DatabaseStats>,
    state: Mutex<PoolState>,
    /// Signalled whenever a usage is released or a block is lifted.
    released: Condvar,
}

#[derive(Default)]
struct PoolState {
    registry: HashMap<ThreadId, Arc<Context>>,
    in_flight: HashMap<ThreadId, InFlight>,
    generation: u64,
    next_id: u64,
    active_usages: usize,
    blocked_by: Option<ThreadId>,
    disposed: bool,
}

struct InFlight {
    context: Arc<Context>,
    usages: usize,
}

/// One checked-out usage of the calling thread's context.
///
/// Releasing the lease (dropping it) is what lets a drain finish.
pub(crate) struct Lease {
    pool: Arc<ContextPool>,
    context: Arc<Context>,
    _not_send: NotSend,
}

impl Lease {
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn shared_context(&self) -> Arc<Context> {
        Arc::clone(&self.context)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.release();
    }
}

impl ContextPool {
    pub fn new(settings: ContextSettings, stats: Arc<DatabaseStats>) -> Self {
        Self {
            settings,
            stats,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
        }
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Check out the calling thread's context.
    ///
    /// Waits while another thread holds a blocking section, unless the
    /// calling thread already has usages in flight.
    pub fn checkout(self: &Arc<Self>) -> Result<Lease, TempoError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        loop {
            if state.disposed {
                return Err(TempoError::Disposed);
            }
            if let Some(in_flight) = state.in_flight.get_mut(&me) {
                in_flight.usages += 1;
                let context = Arc::clone(&in_flight.context);
                state.active_usages += 1;
                self.stats.set_active_usages(state.active_usages);
                return Ok(self.lease(context));
            }
            match state.blocked_by {
                Some(blocker) if blocker != me => self.released.wait(&mut state),
                _ => break,
            }
        }

        let context = match state.registry.get(&me) {
            Some(context) => Arc::clone(context),
            None => {
                // Opening under the lock serializes construction and migration.
                let id = state.next_id;
                state.next_id += 1;
                let context = Arc::new(Context::open(id, state.generation, &self.settings)?);
                self.stats.record_context_created();
                state.registry.insert(me, Arc::clone(&context));
                context
            }
        };

        state.in_flight.insert(
            me,
            InFlight {
                context: Arc::clone(&context),
                usages: 1,
            },
        );
        state.active_usages += 1;
        self.stats.set_active_usages(state.active_usages);
        Ok(self.lease(context))
    }

    fn lease(self: &Arc<Self>, context: Arc<Context>) -> Lease {
        Lease {
            pool: Arc::clone(self),
            context,
            _not_send: PhantomData,
        }
    }

    fn release(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if let Some(in_flight) = state.in_flight.get_mut(&me) {
            in_flight.usages = in_flight.usages.saturating_sub(1);
            if in_flight.usages == 0 {
                state.in_flight.remove(&me);
            }
        }
        state.active_usages = state.active_usages.saturating_sub(1);
        self.stats.set_active_usages(state.active_usages);
        drop(state);
        self.released.notify_all();
    }

    /// Forget every thread's context and start a new generation.
    ///
    /// Contexts still held by a lease stay open until the lease is released.
    pub fn recycle(&self) {
        let mut state = self.state.lock();
        Self::recycle_locked(&mut state);
        self.stats.record_recycle();
    }

    fn recycle_locked(state: &mut PoolState) {
        let forgotten = state.registry.len();
        state.registry.clear();
        state.generation += 1;
        debug!(
            generation = state.generation,
            forgotten, "context pool recycled"
        );
    }

    /// Whether the calling thread currently holds any usage.
    pub fn has_usage_on_current_thread(&self) -> bool {
        let me = thread::current().id();
        self.state.lock().in_flight.contains_key(&me)
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_blocked(&self) -> bool {
        self.state.lock().blocked_by.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Stop handing out contexts to other threads and wait for every
    /// outstanding usage to be released.
    pub fn block(&self) -> Result<(), TempoError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.in_flight.contains_key(&me) {
            return Err(TempoError::WouldDeadlock(
                "cannot block all operations while this thread holds a context usage".into(),
            ));
        }
        loop {
            if state.disposed {
                return Err(TempoError::Disposed);
            }
            match state.blocked_by {
                Some(blocker) if blocker == me => {
                    return Err(TempoError::WouldDeadlock(
                        "this thread already holds a blocking section".into(),
                    ));
                }
                Some(_) => self.released.wait(&mut state),
                None => break,
            }
        }

        state.blocked_by = Some(me);
        Self::recycle_locked(&mut state);
        self.stats.record_recycle();

        let started = Instant::now();
        while state.active_usages > 0 {
            debug!(
                outstanding = state.active_usages,
                "waiting for context usages to drain"
            );
            self.released
                .wait_for(&mut state, self.settings.drain_poll_interval);
        }
        let waited = started.elapsed();
        recording::record_drain(waited.as_secs_f64());
        info!(
            waited_ms = waited.as_millis() as u64,
            "all database operations blocked"
        );
        Ok(())
    }

    pub fn unblock(&self) {
        let mut state = self.state.lock();
        state.blocked_by = None;
        drop(state);
        self.released.notify_all();
        debug!("database operations unblocked");
    }

    /// Refuse every further checkout and drop all registered contexts.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.disposed = true;
        state.registry.clear();
        drop(state);
        self.released.notify_all();
    }
}
