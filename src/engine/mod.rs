//! The escrow engine: payment state machine, ledger accounting, dispute
//! workflow and withdrawal lifecycle.
//!
//! Every entry point runs its mutations inside a single rusqlite
//! transaction; partial application is never observable. Idempotency is
//! re-checked against persisted state inside the transaction, so duplicate
//! webhook deliveries and racing admin actions converge on the first
//! committed outcome.

pub mod dispute;
pub mod ledger;
pub mod payment;
pub mod withdrawal;
