use anyhow::{anyhow, Result};
use nvsmi_query::{GpuProcess, NvidiaSmi};
use std::path::PathBuf;

/// Pick the nvidia-smi binary: `--nvidia-smi`, then the config file, then PATH
pub fn resolve_nvidia_smi(flag: Option<PathBuf>, configured: Option<PathBuf>) -> Result<NvidiaSmi> {
    if let Some(path) = flag.or(configured) {
        return Ok(NvidiaSmi::with_path(path));
    }

    NvidiaSmi::locate().map_err(|_| {
        anyhow!(
            "Couldn't find 'nvidia-smi' in $PATH: {}",
            std::env::var("PATH").unwrap_or_default()
        )
    })
}

/// Keep the processes running on the requested GPUs.
///
/// GPU indices take precedence: `uuids` is only looked at when `ids` is empty.
/// With neither, every process is kept.
pub fn select_processes(processes: Vec<GpuProcess>, ids: &[i64], uuids: &[String]) -> Vec<GpuProcess> {
    if !ids.is_empty() {
        processes
            .into_iter()
            .filter(|proc| ids.contains(&proc.gpu_id))
            .collect()
    } else if !uuids.is_empty() {
        processes
            .into_iter()
            .filter(|proc| uuids.contains(&proc.gpu_uuid))
            .collect()
    } else {
        processes
    }
}
