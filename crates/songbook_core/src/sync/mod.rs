//! Replica synchronization: change detection, connectivity and the
//! load/refresh orchestrator.
//!
//! # Responsibility
//! - Own the published in-memory snapshot and its sync status flags.
//! - Coordinate load-on-start, foreground refresh and periodic background
//!   refresh against the local store and the remote provider.
//!
//! # Invariants
//! - The snapshot is replaced atomically as a whole, never patched.
//! - Exactly one writer role (the replica manager); readers only clone.

pub mod change;
pub mod connectivity;
pub mod replica;
