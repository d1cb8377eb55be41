//! Application Layer - Orchestration of the feed synchronization protocol
//!
//! This module coordinates between the domain and infrastructure layers:
//! it owns the control flow every updater follows and the error taxonomy
//! that decides what aborts a run and what merely drops a record.

pub mod errors;
pub mod services;

pub use errors::*;
pub use services::*;
