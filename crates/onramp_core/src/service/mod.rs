//! Use-case services above the repository layer.
//!
//! # Responsibility
//! - Enforce caller-side invariants (non-empty instances, unique action ids)
//!   that the repository layer assumes.

pub mod action_service;
