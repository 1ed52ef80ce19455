//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the local persistent store contract used by the replica manager.
//! - Isolate SQLite query details from sync/search orchestration.
//!
//! # Invariants
//! - `replace_all` is all-or-nothing; readers never observe a half-written
//!   record set.
//! - Repository APIs return semantic errors in addition to DB transport
//!   errors.

pub mod song_repo;
