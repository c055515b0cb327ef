//! Names shared across the crate.

pub const APP_NAME: &str = "cforge";

/// Project file looked up in the project root.
pub const PROJECT_FILE: &str = "cforge.toml";

/// Sentinel proving an output directory was materialized.
pub const DIR_MARKER: &str = ".dirstamp";

/// Version written into every dependency record.
pub const DEP_RECORD_VERSION: u32 = 1;

/// Suffix appended to dependency record file names.
pub const DEP_RECORD_EXT: &str = "json";

/// Environment variable overriding the raw host string.
pub const HOST_ENV: &str = "CFORGE_HOST";

/// Subdirectories of a per-platform output root.
pub const OBJ_DIR: &str = "obj";
pub const DEP_DIR: &str = "dep";
pub const BIN_DIR: &str = "bin";
pub const MOD_DIR: &str = "mod";
