//! Late-joiner catch-up state machine.
//!
//! A peer joining a session in progress asks the room for the current set of
//! completed strokes. The request is retried with exponential backoff; if no
//! peer ever answers, the joiner assumes there was nothing to catch up on.
//!
//! # State Machine
//!
//! ```text
//!                 activate, 0 remote peers
//!          ┌─────────────────────────────────────────┐
//!          │                                         ▼
//! ┌──────┐ │ activate, >=1 remote peer ┌────────────┐  snapshot / exhausted  ┌────────┐
//! │ Idle │─┴──────────────────────────>│ Requesting │───────────────────────>│ Synced │
//! └──────┘                             └────────────┘                        └────────┘
//!    ▲                                   │   ▲ timeout: resend,                  │
//!    │                                   └───┘ timeout *= factor                 │
//!    └──────────────────────────── reset (session teardown) ─────────────────────┘
//! ```
//!
//! The canvas is interactive in every state. This machine only decides whether
//! a background merge is still pending.

use std::time::{Duration, Instant};

use crate::config::SyncConfig;

/// Catch-up progress of the local peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No catch-up needed or surface inactive
    #[default]
    Idle,
    /// State request outstanding
    Requesting,
    /// Snapshot applied, or retries exhausted and empty state assumed
    Synced,
}

/// Result of checking the request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Deadline not reached, or no request outstanding
    Pending,
    /// Deadline passed; send another state request
    Resend {
        /// 1-based attempt number of the request to send
        attempt: u32,
    },
    /// Final deadline passed; catch-up gave up
    Exhausted,
}

/// Catch-up state for one collaborative session.
#[derive(Debug, Clone, Default)]
pub struct CatchUp {
    state: SyncState,
    attempts: u32,
    deadline: Option<Instant>,
    snapshot_received: bool,
}

impl CatchUp {
    /// Create in Idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Number of state requests sent this session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the outstanding request times out.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a snapshot was accepted this session.
    pub fn snapshot_received(&self) -> bool {
        self.snapshot_received
    }

    /// Start catch-up when the surface becomes active.
    ///
    /// Returns true if a state request must be sent now. With no remote peers
    /// there is nobody to ask, so the peer is synced immediately.
    pub fn begin(&mut self, now: Instant, remote_peers: usize, config: &SyncConfig) -> bool {
        if self.state != SyncState::Idle {
            return false;
        }

        if remote_peers == 0 || config.max_request_attempts == 0 {
            self.state = SyncState::Synced;
            return false;
        }

        self.state = SyncState::Requesting;
        self.attempts = 1;
        self.deadline = now.checked_add(config.request_timeout(1));
        true
    }

    /// Check the request deadline.
    pub fn poll_timeout(&mut self, now: Instant, config: &SyncConfig) -> RetryOutcome {
        let Some(deadline) = self.deadline else {
            return RetryOutcome::Pending;
        };
        if self.state != SyncState::Requesting || now < deadline {
            return RetryOutcome::Pending;
        }

        if self.attempts >= config.max_request_attempts {
            self.state = SyncState::Synced;
            self.deadline = None;
            return RetryOutcome::Exhausted;
        }

        self.attempts += 1;
        // A timeout past the end of the clock never fires; the request waits
        // for a snapshot indefinitely.
        self.deadline = now.checked_add(config.request_timeout(self.attempts));
        RetryOutcome::Resend { attempt: self.attempts }
    }

    /// Accept a snapshot addressed to this peer.
    ///
    /// First snapshot wins: returns false if one was already accepted this
    /// session, or if no session has begun. Cancels the outstanding request
    /// timeout.
    pub fn accept_snapshot(&mut self) -> bool {
        if self.state == SyncState::Idle || self.snapshot_received {
            return false;
        }
        self.snapshot_received = true;
        self.state = SyncState::Synced;
        self.deadline = None;
        true
    }

    /// Forget all session state and return to Idle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Time remaining until the request deadline.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(now))
    }
}
