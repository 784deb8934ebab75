//! # Bounded Queue Module
//!
//! This module provides a fixed-capacity, close-aware FIFO used to couple
//! the pipeline's three stages with bounded memory instead of an unbounded
//! channel.
//!
//! ## Overview
//!
//! `BoundedQueue<T>` sits between two neighboring stages and is what gives
//! the whole pipeline its backpressure:
//!
//! - **Producer**: blocks in `push` once the queue is at capacity, instead
//!   of growing without bound while the downstream stage is slower
//! - **Consumer**: blocks in `pop` once the queue is empty, instead of
//!   busy-waiting for the next item
//! - **Close**: a one-way open -> closed transition that wakes every waiter
//!   and turns a blocked `push`/`pop` into a normal terminal outcome rather
//!   than an error
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   push()    ┌───────────────────┐   pop()    ┌──────────────┐
//! │   Producer   │ ──────────▶ │  BoundedQueue<T>   │ ─────────▶ │   Consumer   │
//! │  (stage N)   │ blocks if   │  Mutex<VecDeque<T>> │ blocks if  │ (stage N+1)  │
//! └──────────────┘  full       │  + 2 Condvars       │  empty     └──────────────┘
//!                              └───────────────────┘
//! ```
//!
//! ## Close Semantics
//!
//! - `push` on a closed queue returns `Rejected` without enqueuing, even
//!   when the queue has free capacity; `Rejected` is a normal terminal
//!   signal, not an error.
//! - `pop` on a closed, empty queue returns `None`; items enqueued before
//!   `close()` was called are still delivered to `pop` first.
//! - `close()` is idempotent and wakes every blocked `push`/`pop`, so no
//!   stage can block forever on a queue that will never receive more input.
//!
//! ## Performance Characteristics
//!
//! - **FIFO order**: preserved for any single-producer/single-consumer
//!   interleaving; the queue stays correct (though no longer end-to-end
//!   ordered) with multiple producers or consumers too
//! - **Bounded memory**: capacity `C` caps the underlying `VecDeque` at `C`
//!   items regardless of how far ahead the producer gets
//! - **Lock granularity**: one `Mutex` guards all state; neither `push` nor
//!   `pop` holds it across anything but the `VecDeque` operation itself

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Outcome of a [`BoundedQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Rejected,
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/// Capacity-`C` FIFO with explicit open/closed state. Correct for multiple
/// producers and consumers, though this pipeline uses exactly one of each
/// per queue.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "BoundedQueue capacity must be at least 1");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Blocks while the queue is open and full. Returns `Rejected` without
    /// enqueuing if the queue was, or became, closed.
    pub fn push(&self, item: T) -> PushOutcome {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.closed {
                return PushOutcome::Rejected;
            }
            if inner.items.len() < inner.capacity {
                inner.items.push_back(item);
                self.not_empty.notify_one();
                return PushOutcome::Accepted;
            }
            inner = self.not_full.wait(inner).unwrap();
        }
    }

    /// Blocks while the queue is open and empty. Returns `None` once the
    /// queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Idempotent. Items already enqueued remain available to `pop` until
    /// drained.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }
}
