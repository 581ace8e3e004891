//! Edit-lock protocol with heartbeat-based expiry.
//!
//! # Responsibility
//! - Supply the time source for lock decisions.
//! - Evaluate acquire/heartbeat/release/save/force-unlock transitions.
//!
//! # Invariants
//! - Decisions are pure; persistence happens in the service layer.

pub mod clock;
pub mod manager;
