//! Admission layer and process bootstrap for Voxguard.
//!
//! This crate owns everything chosen once at startup: configuration, the
//! state/audit backend factories, the fixed-window rate limiter, the
//! canonical admission contract, and the thin HTTP surface over it. The two
//! binaries (`voxguard-server`, `voxguard-worker`) share this crate's
//! configuration and factories so both sides of the queue agree on backends
//! and keyspaces.

pub mod admission;
pub mod api;
pub mod audit_factory;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod state_factory;
