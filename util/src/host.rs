//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the root of the vehicle software checkout.
pub const SW_ROOT_ENV_VAR: &str = "VEH_SW_ROOT";

/// Get the root directory of the vehicle software, which contains the `params` and `sessions`
/// directories.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
