//! Shared data model and defaults for summit.
//!
//! This crate defines the types passed between the PDF engine, the
//! summarizers, and the HTTP surface.

pub mod defaults;
pub mod models;

pub use models::*;
