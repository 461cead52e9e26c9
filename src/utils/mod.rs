//! Cross-platform utilities used by the update core.

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, ensure_dir};
pub use platform::{PlatformKey, get_home_dir, is_windows};
