//! Domain model for tracked projects.
//!
//! # Responsibility
//! - Define the canonical project record and its submitted-form shape.
//! - Own field-level validation and the derived check-in state.
//!
//! # Invariants
//! - Every stored project carries a stable `ProjectId`.
//! - Check-in state is derived from `checked_until` at read time, never stored
//!   as a boolean.

pub mod project;
