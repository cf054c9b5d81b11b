use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// On-disk configuration. Every field is optional so the merge in
/// `app::build_run_options` can fall through to CLI values and defaults.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub wordlist: Option<String>,
    pub output: Option<String>,
    pub threads: Option<usize>,
    pub status_codes: Option<String>,
    pub timeout: Option<u64>,
    pub recursive: Option<bool>,
    pub max_depth: Option<usize>,
    pub user_agent: Option<String>,
    pub no_verify_ssl: Option<bool>,
    pub retries: Option<u32>,
    pub rate: Option<u32>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub dedup_output: Option<bool>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".pathprobe").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}
