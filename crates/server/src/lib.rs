//! Gatehouse server library.
//!
//! Account activation and credential authentication: a new account must
//! be verified by a short-lived, single-use activation code before it
//! can authenticate, and successful authentication yields a signed
//! session token carrying identity claims.
//!
//! The binary entry point lives in `main.rs`; everything else is
//! exposed here so it can be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
