//! OsmFlux - command synchronisation and self-update core
//!
//! OsmFlux bundles a set of native OpenStreetMap command-line tools (`osmfilter`,
//! `osmconvert`, `glancet`, ...) with a desktop application. This crate keeps those
//! tools in sync with the latest published release and detects application updates.
//!
//! # Architecture Overview
//!
//! ```text
//! UpdateOrchestrator
//!   ├── CadenceGate ─────────── LastCheckRecord ── KeyValueStore
//!   ├── ManifestFetcher ─────── Transport
//!   ├── UpdatePlanner
//!   │     ├── CommandInventory ── PlatformKey
//!   │     └── ContentHasher
//!   ├── BinaryUpdater ───────── BackupManager, ExecutableMarker
//!   ├── BundleInstaller
//!   └── UserPrompt / AppInstaller
//! ```
//!
//! The orchestrator only talks to its host through the capability traits in [`host`],
//! which makes every cycle testable with the fakes in `test_utils`.
//!
//! # Core Modules
//!
//! - [`core`] - Error taxonomy and user-facing error rendering
//! - [`config`] - Global configuration and persisted key-value storage
//! - [`host`] - Capability traits and their production implementations
//! - [`update`] - Hasher, inventory, manifest, planner, updater, cadence, orchestrator
//! - [`utils`] - Platform resolution and filesystem helpers
//! - [`cli`] - The `osmflux` command tree
//!
//! # Release Layout
//!
//! ```text
//! {base_url}/releases/{stable|dev}/latest/
//! ├── update_manifest.json
//! ├── resources.neu
//! └── commands/{name}/{os}/{arch}/{name}[.exe]
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod host;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
