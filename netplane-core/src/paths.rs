//! Centralized path configuration for netplane.
//!
//! All data paths should go through this module so that every component of a
//! member agrees on where state lives.

use std::path::PathBuf;

/// Get the netplane data directory.
///
/// Resolution order:
/// 1. `NETPLANE_DATA_DIR` environment variable
/// 2. `/var/lib/netplane` if it exists (system install)
/// 3. `~/.netplane` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NETPLANE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/netplane");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".netplane")).unwrap_or(system_dir)
}

/// Get the database path.
pub fn db_path() -> PathBuf {
    data_dir().join("netplane.db")
}

/// Get the directory holding per-network state.
pub fn networks_dir() -> PathBuf {
    data_dir().join("networks")
}

/// Get the directory holding the member configuration file.
pub fn config_dir() -> PathBuf {
    data_dir().join("config")
}
