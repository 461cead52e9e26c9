//! Configuration and persisted state.
//!
//! - [`GlobalConfig`]: the user's `config.toml` (release server, channel, layout, update
//!   behaviour, bundles)
//! - [`JsonFileStore`]: durable key-value storage behind the update cadence and the
//!   directory preferences
//! - [`Preferences`]: remembered open/save directories

mod global;
mod storage;

pub use global::{CONFIG_PATH_ENV, DEFAULT_BASE_URL, GlobalConfig};
pub use storage::{JsonFileStore, LAST_OPENED_DIR_KEY, LAST_SAVED_DIR_KEY, Preferences};
