//! Gatehouse Core - Shared types library.
//!
//! This crate provides the common types used by the Gatehouse server:
//! validated email addresses and type-safe entity IDs. It contains only
//! types - no I/O, no database access, no HTTP clients - so it can be
//! used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
