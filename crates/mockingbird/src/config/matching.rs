//! Mapping selection settings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIN_PATH_PREFIX: &str = "/__admin";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Answer with the best partial match when nothing matches perfectly.
    #[serde(default)]
    pub allow_partial_mapping: bool,
    /// Requests under this prefix don't log matcher failures.
    #[serde(default = "default_admin_path_prefix")]
    pub admin_path_prefix: String,
}

fn default_admin_path_prefix() -> String {
    DEFAULT_ADMIN_PATH_PREFIX.to_string()
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            allow_partial_mapping: false,
            admin_path_prefix: default_admin_path_prefix(),
        }
    }
}
