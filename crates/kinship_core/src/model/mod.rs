//! Domain model for the family relationship graph.
//!
//! # Responsibility
//! - Define canonical member and relationship-edge records used by core
//!   business logic.
//! - Keep one flat edge-list shape that every service reads and writes.
//!
//! # Invariants
//! - Every domain object is identified by a stable `MemberId`.
//! - Every stored edge must be accompanied by its reciprocal; the
//!   reconciler is the only writer trusted to uphold that pairing.

pub mod edge;
pub mod member;
