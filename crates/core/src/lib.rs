//! Functional core for sessiongate.
//!
//! Holds the authentication data model, the error taxonomy surfaced to
//! callers, the traits implemented by stores and identity providers, and
//! the pure functions the engine builds on. Nothing in this crate performs
//! I/O.

pub mod auth;
