//! Shared domain types and pure pipeline logic for the FERA CRM service.
//!
//! Nothing in this crate performs I/O: the store, HTTP surface and session
//! handling live in the `fera` crate and depend on these types.

pub mod filter;
pub mod kanban;
pub mod metrics;
pub mod models;
pub mod scoring;

pub use filter::{LeadFilter, LeadView, StatusFilter};
pub use models::*;
