//! Error taxonomy (spec §7).
//!
//! Three kinds of failure are distinguished:
//! 1. **Configuration errors** (`SimError::Config`) — bad JSON, unknown
//!    protocol/DRAM type, malformed `address_mapping`. Fail fast at startup.
//! 2. **Fatal invariant violations** (`SimError::Fatal`) — a bug in an
//!    upstream scheduler (issuing a command a bank state cannot accept,
//!    retiring a transaction with no matching pending-queue entry, SRAM
//!    reserve without capacity). These never attempt recovery.
//! 3. **Recoverable scheduling conditions** are *not* errors at all — they
//!    are the non-`Issued` variants of [`IssueOutcome`], which callers match
//!    on and retry next tick. The simulator never uses exceptions for flow
//!    control (spec §7).

use thiserror::Error;

/// The simulator's single error type for configuration failures and fatal
/// invariant violations. Recoverable conditions use [`IssueOutcome`] instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration/boot-time error: malformed JSON, unknown enum
    /// value, or an invalid geometry parameter. Reported to stderr as a
    /// single line and a non-zero exit code; never recovered from.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// An invariant violation that indicates a bug in the caller (usually
    /// the scheduler or tile compiler issuing a command/instruction the
    /// receiving state machine cannot accept). Logged with full state and
    /// propagated up to terminate the run; never recovered from.
    #[error("fatal invariant violation in {component}: {message}")]
    Fatal {
        /// The subsystem that detected the violation (e.g. `"bank_state"`,
        /// `"sram"`, `"command_queue"`).
        component: &'static str,
        /// Human-readable description, including relevant state.
        message: String,
    },
}

impl SimError {
    /// Builds a [`SimError::Config`] from a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Builds a [`SimError::Fatal`] tagged with the originating component.
    #[must_use]
    pub fn fatal(component: &'static str, message: impl Into<String>) -> Self {
        Self::Fatal {
            component,
            message: message.into(),
        }
    }
}

/// Outcome of attempting to issue a command, instruction, or memory access
/// this cycle. Unlike [`SimError`], every variant here is a normal,
/// expected result — recoverable conditions are resolved by the caller
/// retrying on a later tick, not by propagating an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueOutcome<T> {
    /// The requested action was issued this cycle.
    Issued(T),
    /// Not issuable yet; the caller should retry on a later cycle once the
    /// given cycle has passed (e.g. a bank timing floor).
    WaitUntil(u64),
    /// Not issuable this cycle for a reason that does not carry a
    /// known retry cycle (e.g. a downstream queue is full); retry next tick.
    NotYet,
}

impl<T> IssueOutcome<T> {
    /// Returns `true` if the action was issued.
    #[must_use]
    pub const fn is_issued(&self) -> bool {
        matches!(self, IssueOutcome::Issued(_))
    }
}
