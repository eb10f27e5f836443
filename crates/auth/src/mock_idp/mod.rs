//! Mock Identity Provider for local development.
//!
//! Serves a login form that issues PKCE-bound authorization codes understood
//! by [`crate::providers::MockProvider`], so the full login flow can be
//! exercised without a real OAuth client registration.

mod server;
mod templates;

pub use server::MockIdpServer;
