use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{QueryError, Result};
use crate::parser::{GPU_QUERY_FIELDS, PROCESS_QUERY_FIELDS};

pub const NVIDIA_SMI: &str = "nvidia-smi";

const FORMAT_ARG: &str = "--format=csv,noheader,nounits";

/// Where raw nvidia-smi text comes from.
///
/// Each call blocks until the complete output is available. Implementations
/// must not retry; a failed call is reported to the caller as is.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource {
    /// Output of the `--query-gpu` listing, one GPU per line
    fn query_gpus(&self) -> Result<String>;

    /// Output of the `--query-compute-apps` listing, one process per line
    fn query_processes(&self) -> Result<String>;
}

/// Runs the real `nvidia-smi` binary
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    binary: PathBuf,
}

impl NvidiaSmi {
    /// Use `nvidia-smi` from `PATH`
    pub fn locate() -> Result<Self> {
        let binary = which::which(NVIDIA_SMI).map_err(|e| QueryError::SourceUnavailable {
            binary: NVIDIA_SMI.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e),
        })?;
        info!("Using {}", binary.display());
        Ok(Self { binary })
    }

    /// Use an explicit binary, e.g. from configuration
    pub fn with_path(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, query_arg: String) -> Result<String> {
        debug!("Running {} {} {}", self.binary.display(), query_arg, FORMAT_ARG);

        let output = Command::new(&self.binary)
            .arg(&query_arg)
            .arg(FORMAT_ARG)
            .output()
            .map_err(|e| QueryError::SourceUnavailable {
                binary: self.binary.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(QueryError::SourceFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `--query-gpu=index,uuid,...`
pub fn gpu_query_arg() -> String {
    format!("--query-gpu={}", GPU_QUERY_FIELDS.join(","))
}

/// `--query-compute-apps=pid,process_name,...`
pub fn process_query_arg() -> String {
    format!("--query-compute-apps={}", PROCESS_QUERY_FIELDS.join(","))
}

impl TelemetrySource for NvidiaSmi {
    fn query_gpus(&self) -> Result<String> {
        self.run(gpu_query_arg())
    }

    fn query_processes(&self) -> Result<String> {
        self.run(process_query_arg())
    }
}

impl<S: TelemetrySource + ?Sized> TelemetrySource for &S {
    fn query_gpus(&self) -> Result<String> {
        (**self).query_gpus()
    }

    fn query_processes(&self) -> Result<String> {
        (**self).query_processes()
    }
}

impl<S: TelemetrySource + ?Sized> TelemetrySource for Box<S> {
    fn query_gpus(&self) -> Result<String> {
        (**self).query_gpus()
    }

    fn query_processes(&self) -> Result<String> {
        (**self).query_processes()
    }
}
