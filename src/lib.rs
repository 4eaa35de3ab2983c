//! Gatekeeper - Request Admission Control
//!
//! This crate decides whether a request to an expensive backend endpoint may
//! proceed. Each endpoint carries its own sliding-window quota per client
//! identity, and identities that overflow their quota are blocked for
//! escalating periods. All state is in-process and owned by explicitly
//! constructed components; there is no global limiter.

pub mod admission;
pub mod config;
pub mod error;
pub mod replay;
pub mod telemetry;
