//! Per-request context: correlation id and deadline.
//!
//! # Invariants
//! - A context is created once per external request and passed by reference
//!   down to the storage layer; nothing here is process-global.
//! - Repositories never extend a caller's deadline, only shorten it.

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Point in time after which an operation must give up and roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: instant }
    }

    /// Time left before expiry; zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn earliest(self, other: Self) -> Self {
        self.min(other)
    }
}

/// Request-scoped values every storage operation receives.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    deadline: Deadline,
}

impl RequestContext {
    /// New context with a fresh correlation id and `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Deadline::after(timeout))
    }

    pub fn with_deadline(deadline: Deadline) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Caller deadline capped by a store-level timeout.
    pub fn bounded_deadline(&self, cap: Duration) -> Deadline {
        self.deadline.earliest(Deadline::after(cap))
    }
}
