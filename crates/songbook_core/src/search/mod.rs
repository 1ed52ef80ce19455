//! Search-ready projection and filtering over the published snapshot.
//!
//! # Responsibility
//! - Derive the normalized search index from the published record set.
//! - Apply filter/sort queries and page-index grouping for list views.
//!
//! # Invariants
//! - The index is derived data only; it never mutates the snapshot.
//! - Matching is diacritic-insensitive and case-insensitive.

pub mod index;
pub mod page_index;
