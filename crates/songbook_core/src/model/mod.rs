//! Domain model for the song-book replica.
//!
//! # Responsibility
//! - Define the canonical song record shared by storage, sync and search.
//! - Keep one record shape for headers and their owned lines.
//!
//! # Invariants
//! - Every record is identified by a stable composite [`song::SongKey`].
//! - Lines never exist outside their parent record.

pub mod song;
