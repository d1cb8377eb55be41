//! Vulnfeed - vulnerability feed ingestion and normalization
//!
//! This crate ingests per-distribution advisory databases and turns them into
//! normalized, comparably-ordered records usable to decide whether an
//! installed package is vulnerable. It is built around three pieces: a
//! pluggable version ordering engine replicating dpkg's comparison semantics,
//! a resolver that flattens boolean advisory criteria trees into concrete
//! affected-package facts, and an incremental synchronization protocol that
//! makes feed re-ingestion idempotent.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
