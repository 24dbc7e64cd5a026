//! Transport session with a maximum idle age
//!
//! A [`ManagedConnection`] hands out its transport handle through
//! [`ManagedConnection::acquire_for_use`]. When the handle has sat idle for
//! longer than `max_age` it is closed and replaced with a fresh one before it
//! is handed out, so a stale pooled socket never reaches the wire.
//!
//! The check-then-replace sequence is not atomic on its own. Callers that
//! share a connection must serialize access; `BackendCore` keeps it behind a
//! mutex for that reason.

use crate::transport::{Transport, TransportError, TransportFactory};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default maximum idle age of a session
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);

/// Transport session that recycles itself after `max_age` of idleness
pub struct ManagedConnection<F: TransportFactory> {
    factory: F,
    handle: F::Handle,
    max_age: Duration,
    last_used_at: Instant,
    generation: u64,
}

impl<F: TransportFactory> ManagedConnection<F> {
    /// Open the first session
    pub fn open(factory: F, max_age: Duration) -> Result<Self, TransportError> {
        let handle = factory.open()?;
        Ok(Self {
            factory,
            handle,
            max_age,
            last_used_at: Instant::now(),
            generation: 0,
        })
    }

    /// Maximum idle age before the session is replaced
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// When the session was last handed out
    #[must_use]
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Number of times the session has been replaced
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Hand out the session, replacing it first if it has gone stale
    pub fn acquire_for_use(&mut self) -> Result<&F::Handle, TransportError> {
        self.acquire_at(Instant::now())
    }

    pub(crate) fn acquire_at(&mut self, now: Instant) -> Result<&F::Handle, TransportError> {
        let idle = now.saturating_duration_since(self.last_used_at);
        if idle > self.max_age {
            // last_used_at stays put on failure so the next call tries again
            let fresh = self.factory.open()?;
            let stale = std::mem::replace(&mut self.handle, fresh);
            stale.close();
            self.generation += 1;
            debug!(
                idle_ms = idle.as_millis(),
                max_age_ms = self.max_age.as_millis(),
                generation = self.generation,
                "Recycled idle connection"
            );
        }

        self.last_used_at = now;
        Ok(&self.handle)
    }
}
