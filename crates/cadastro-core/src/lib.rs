//! Core types and trait definitions for the Cadastro backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the permission evaluator, the generic child
//! reconciler and the store/mail abstractions the other crates implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod error;
pub mod location;
pub mod mail;
pub mod permission;
pub mod person;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
