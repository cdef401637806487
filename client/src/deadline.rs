//! Per-call cancellation handle.
//!
//! # Design
//! Every client operation takes a [`Deadline`]: a point in time after which
//! the caller no longer wants the result. The client refuses to dispatch a
//! request whose deadline has already passed, and threads the remaining
//! budget onto the outgoing request as the transport timeout, so an expiry
//! mid-flight aborts the call with a transport error. `Deadline` is `Copy`,
//! so one value can bound a sequence of calls; the budget shrinks as time
//! passes, not per call.

use std::time::{Duration, Instant};

/// A point in time bounding a single client call (or a sequence of them).
///
/// The default value carries no bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No time bound; the call runs until the transport gives up on its own.
    pub fn none() -> Self {
        Deadline(None)
    }

    /// Expire `timeout` from now. A timeout too far out for the clock to
    /// represent leaves the deadline unbounded.
    pub fn within(timeout: Duration) -> Self {
        Deadline(Instant::now().checked_add(timeout))
    }

    /// Expire at `instant`.
    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    /// Time left before expiry. `None` means unbounded; an expired deadline
    /// reports `Some(Duration::ZERO)`.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}
