//! Command synchronisation and application update.
//!
//! OsmFlux ships a set of native command-line tools (`osmfilter`, `osmconvert`,
//! `glancet`, ...) next to the application. This module keeps them in line with the
//! latest published release and tells the caller when the application itself is out of
//! date.
//!
//! # Components
//!
//! - [`hasher`]: content digests (MD5 as published, SHA-256 accepted)
//! - [`inventory`]: local command enumeration, production and development layouts
//! - [`manifest`]: remote manifest shape, release URLs, fetching
//! - [`planner`]: diff of local digests against the manifest
//! - [`backup`] and [`updater`]: transactional per-command replacement
//! - [`cadence`]: 12-hour gate for automatic checks and its persisted timestamp
//! - [`bundle`]: archive-distributed auxiliary tools
//! - [`orchestrator`]: one complete check cycle
//! - [`config`]: the `[update]` configuration table
//!
//! # Cycle
//!
//! ```text
//! 1. Cadence gate (automatic checks only)
//! 2. GET update_manifest.json?ts=...
//! 3. List commands, hash them, plan replacements
//! 4. For each item, in name order:
//!    ├── move original to .bak
//!    ├── download, write, verify digest, chmod +x
//!    └── success: drop .bak / failure: restore .bak
//! 5. Ensure auxiliary bundles
//! 6. Compare application version, offer install and restart
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use osmflux::update::{Trigger, UpdateOrchestrator};
//!
//! # async fn example(orchestrator: UpdateOrchestrator) {
//! let outcome = orchestrator.run_check(Trigger::Manual).await;
//! for item in outcome.failed_items() {
//!     eprintln!("{}: {:?}", item.command, item.result);
//! }
//! # }
//! ```

pub mod backup;
pub mod bundle;
pub mod cadence;
pub mod config;
pub mod hasher;
pub mod inventory;
pub mod manifest;
pub mod orchestrator;
pub mod planner;
pub mod updater;

pub use bundle::{BundleConfig, BundleInstaller, BundleStatus};
pub use cadence::{CadenceGate, LastCheckRecord};
pub use config::UpdateConfig;
pub use hasher::{ContentDigest, ContentHasher, DigestAlgorithm};
pub use inventory::{CommandInventory, CommandRecord, InstallMode};
pub use manifest::{Channel, ManifestFetcher, ReleaseEndpoint, RemoteManifest};
pub use orchestrator::{
    BundleReport, CheckStatus, Collaborators, ItemReport, Trigger, UpdateOrchestrator,
    UpdateOutcome,
};
pub use planner::{UpdatePlanItem, UpdatePlanner};
pub use updater::BinaryUpdater;
