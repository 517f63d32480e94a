//! # Kiosk Proxy Library
//!
//! Local authenticating reverse proxy: unauthenticated clients on the
//! device issue plain HTTP requests, the proxy attaches a short-lived
//! audience-scoped identity token per upstream and relays the call —
//! including long-lived SSE streams — back unmodified.
//!
//! Modules:
//! - `config` — environment-sourced service configuration
//! - `cache` — audience-keyed token cache with per-audience refresh
//! - `sources` — identity-endpoint token issuer
//! - `proxy` — unary and streaming relay handlers
//! - `server` — router and HTTP server wiring
//! - `observability` — prometheus metrics

pub mod cache;
pub mod config;
pub mod helpers;
pub mod observability;
pub mod proxy;
pub mod server;
pub mod sources;
pub mod tests;
pub mod utils;
