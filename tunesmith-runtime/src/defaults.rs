use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "tunesmith.json";

/// `tunesmith.json` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}
