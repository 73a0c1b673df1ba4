//! Scratch context pool
//!
//! Each top-level call checks out one [`Scratch`] (namespace buffers, the
//! structural cursor and the field error list) and returns it when the
//! guard drops, on success and error paths alike. Released contexts are
//! reset before they become visible to the next caller.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::config::PoolConfig;
use crate::field_error::FieldError;
use crate::namespace::{Namespace, Step};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-call mutable state
#[derive(Debug, Default)]
pub struct Scratch {
    pub(crate) namespace: Namespace,
    pub(crate) cursor: Vec<Step>,
    pub(crate) errors: Vec<FieldError>,
}

impl Scratch {
    fn new(namespace_capacity: usize) -> Self {
        Self {
            namespace: Namespace::with_capacity(namespace_capacity),
            cursor: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Truncate buffers and drop collected errors, keeping allocations
    pub fn reset(&mut self) {
        self.namespace.clear();
        self.cursor.clear();
        self.errors.clear();
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn is_clean(&self) -> bool {
        self.namespace.is_empty() && self.cursor.is_empty() && self.errors.is_empty()
    }
}

/// Bounded pool of idle scratch contexts
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<Scratch>>,
    config: PoolConfig,
    created: AtomicUsize,
}

impl ContextPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(config.max_idle)),
            config,
            created: AtomicUsize::new(0),
        }
    }

    /// Check out a context, creating one when none is idle
    pub fn acquire(&self) -> PooledScratch<'_> {
        let scratch = self.idle.lock().pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Scratch::new(self.config.namespace_capacity)
        });
        PooledScratch {
            pool: self,
            scratch,
        }
    }

    fn release(&self, mut scratch: Scratch) {
        scratch.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_idle {
            idle.push(scratch);
        }
    }

    /// Contexts currently idle
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Contexts created over the pool's lifetime
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

/// Exclusive checkout of one [`Scratch`], returned to the pool on drop
pub struct PooledScratch<'p> {
    pool: &'p ContextPool,
    scratch: Scratch,
}

impl Deref for PooledScratch<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.scratch
    }
}

impl DerefMut for PooledScratch<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }
}

impl Drop for PooledScratch<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.scratch));
    }
}
