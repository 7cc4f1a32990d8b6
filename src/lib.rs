//! auditgate - incremental analyzer cache and diagnostic budget ratchet
//!
//! Two independent pieces for keeping static analysis cheap and honest on
//! large codebases:
//!
//! - [`cache`] skips re-running an analyzer when nothing in scope changed
//! - [`ratchet`] turns today's diagnostic counts into a budget that may only
//!   shrink

pub mod cache;
pub mod config;
pub mod models;
pub mod ratchet;
pub mod reporters;
