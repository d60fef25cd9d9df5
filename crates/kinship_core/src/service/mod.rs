//! Core use-case services of the relationship graph engine.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs: reconcile,
//!   bulk import, sibling inference, and tree building.
//! - Keep presentation/import callers decoupled from storage details.

pub mod import;
pub mod inference;
pub mod reconcile;
pub mod tree;
