//! Cooperative interruption of long-running decision-diagram work.
//!
//! Every manager operation that allocates or recurses calls
//! [`Budget::tick`]. The node limit is checked on every tick; cancellation
//! and the deadline are checked every [`CHECK_INTERVAL`] ticks. Once a
//! budget trips it stays tripped, and the managers short-circuit until the
//! caller notices via [`Budget::interrupted`].

use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::debug;

/// Number of ticks between two checks of the cancel flag and the clock.
pub const CHECK_INTERVAL: u64 = 1024;

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token handed to another thread can
/// stop a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Reason a budget tripped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    Cancelled,
    Timeout,
    NodeLimit,
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::Cancelled => write!(f, "cancelled"),
            Interrupt::Timeout => write!(f, "time limit reached"),
            Interrupt::NodeLimit => write!(f, "node limit reached"),
        }
    }
}

/// Cancel token and deadline, checkable from any thread.
///
/// This is the part of a [`Budget`] that parallel quantification workers
/// poll between chunks of work.
#[derive(Debug, Clone, Default)]
pub struct Watchdog {
    token: CancelToken,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(token: CancelToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    pub fn check(&self) -> Result<(), Interrupt> {
        if self.token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupt::Timeout),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct Budget {
    watchdog: Watchdog,
    node_limit: usize,
    steps: Cell<u64>,
    tripped: Cell<Option<Interrupt>>,
}

impl Budget {
    pub fn new(token: CancelToken, deadline: Option<Instant>, node_limit: usize) -> Self {
        Self {
            watchdog: Watchdog::new(token, deadline),
            node_limit,
            steps: Cell::new(0),
            tripped: Cell::new(None),
        }
    }

    /// A budget that never trips.
    pub fn unlimited() -> Self {
        Self::new(CancelToken::new(), None, usize::MAX)
    }

    pub fn node_limit(&self) -> usize {
        self.node_limit
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Account for one unit of work done by a manager currently holding
    /// `nodes` nodes. Returns `false` once the budget is exhausted.
    pub fn tick(&self, nodes: usize) -> bool {
        if self.tripped.get().is_some() {
            return false;
        }
        let steps = self.steps.get() + 1;
        self.steps.set(steps);

        if nodes > self.node_limit {
            self.trip(Interrupt::NodeLimit);
            return false;
        }
        if steps % CHECK_INTERVAL == 0 {
            return self.check().is_ok();
        }
        true
    }

    /// Check cancellation and the deadline right now.
    pub fn check(&self) -> Result<(), Interrupt> {
        if let Some(reason) = self.tripped.get() {
            return Err(reason);
        }
        if let Err(reason) = self.watchdog.check() {
            self.trip(reason);
            return Err(reason);
        }
        Ok(())
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn interrupted(&self) -> Option<Interrupt> {
        self.tripped.get()
    }

    fn trip(&self, reason: Interrupt) {
        debug!("budget tripped after {} steps: {}", self.steps.get(), reason);
        self.tripped.set(Some(reason));
    }
}
