//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the edge-store contract the graph engine consumes.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce member validation before persistence.
//! - Edge writes are idempotent upserts under `(source, target, kind)`.
//! - Cross-family edges are rejected, never silently stored.

pub mod family_repo;
