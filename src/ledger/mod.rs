//! Cumulative bookkeeping for the motion logger.
//!
//! Tracks totals across every session run by a service instance and
//! persists them alongside the logs.

pub mod counters;

pub use counters::{LedgerStats, SessionLedger, SharedLedger};
