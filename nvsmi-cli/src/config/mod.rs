use anyhow::{Context, Result};
use nvsmi_query::{GpuFilter, SortKey};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

static CONFIG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// Default number of GPUs printed by `nvsmi ls`
pub const DEFAULT_LIMIT: usize = 999;

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NvsmiConfig {
    /// nvidia-smi binary to run instead of the one on PATH
    pub nvidia_smi: Option<PathBuf>,
    pub ls: LsConfig,
}

/// Defaults for `nvsmi ls`, overridden by command line flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsConfig {
    #[serde(flatten)]
    pub filter: GpuFilter,
    pub limit: usize,
    pub sort: SortKey,
}

impl Default for LsConfig {
    fn default() -> Self {
        Self {
            filter: GpuFilter::default(),
            limit: DEFAULT_LIMIT,
            sort: SortKey::default(),
        }
    }
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    CONFIG_PATH.get().cloned().unwrap_or_else(default_config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nvsmi")
        .join("config.toml")
}

/// Set custom config path
pub fn set_config_path(path: &str) {
    let _ = CONFIG_PATH.set(PathBuf::from(path));
}

/// Load the configuration.
///
/// A missing file at the default location yields the defaults; a missing file
/// given with `--config` is an error.
pub fn load_config() -> Result<NvsmiConfig> {
    let path = get_config_path();
    if CONFIG_PATH.get().is_none() && !path.exists() {
        return Ok(NvsmiConfig::default());
    }
    load_config_from(&path)
}

/// Parse the configuration file at `path`
pub fn load_config_from(path: &Path) -> Result<NvsmiConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let config: NvsmiConfig = toml::from_str(&contents)
        .with_context(|| format!("Invalid configuration file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = NvsmiConfig::default();
        assert!(config.nvidia_smi.is_none());
        assert_eq!(config.ls.limit, DEFAULT_LIMIT);
        assert_eq!(config.ls.sort, SortKey::Id);
        assert_eq!(config.ls.filter, GpuFilter::default());
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
nvidia_smi = "/opt/nvidia/bin/nvidia-smi"

[ls]
mem_free_min = 2048.0
sort = "mem_util"
exclude_uuids = ["GPU-abc"]
"#
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(
            config.nvidia_smi,
            Some(PathBuf::from("/opt/nvidia/bin/nvidia-smi"))
        );
        assert_eq!(config.ls.filter.mem_free_min, 2048.0);
        assert_eq!(config.ls.filter.gpu_util_max, 100.0);
        assert!(config.ls.filter.exclude_uuids.contains("GPU-abc"));
        assert_eq!(config.ls.sort, SortKey::MemUtil);
        assert_eq!(config.ls.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_empty_config_file() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(load_config_from(file.path()).unwrap(), NvsmiConfig::default());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[ls]\nlimit = \"lots\"\n").unwrap();
        assert!(load_config_from(file.path()).is_err());
    }

    // The only test that sets the process-wide path.
    #[test]
    fn test_load_config_reads_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[ls]\nlimit = 4\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        set_config_path(&path);
        assert_eq!(get_config_path(), PathBuf::from(&path));
        assert_eq!(load_config().unwrap().ls.limit, 4);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_config_from(Path::new("/nonexistent/nvsmi.toml")).is_err());
    }
}
