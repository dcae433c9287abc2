//! Client-side core shared by the Kaveri admin console crates.
//!
//! Nothing in here performs network I/O. The Remote Resource Client lives in
//! `kaveri-api-client` and plugs in through [`api::AdminApi`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod token_gate;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
