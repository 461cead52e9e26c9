//! Integration test suite for OsmFlux
//!
//! End-to-end tests of complete update cycles against in-memory collaborators, and of
//! the `osmflux` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_cycle**: orchestrated cycles (fresh install, rollback, partial failure,
//!   cadence, re-entrancy, development layout, bundles)
//! - **cli**: command-line behaviour of the binary

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod update_cycle;
