//! Repository layer over the project storage slot.
//!
//! # Responsibility
//! - Encode and decode the full project list to and from one storage slot.
//! - Keep JSON wire details out of the store's orchestration logic.
//!
//! # Invariants
//! - Read paths reject malformed or invalid persisted state instead of
//!   masking it as an empty list.
//! - Writes always replace the whole slot.

pub mod project_repo;
