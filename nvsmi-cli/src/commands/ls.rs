use anyhow::Result;
use clap::Args;
use nvsmi_query::{GpuQuery, Nvsmi, SortKey, TelemetrySource};
use std::io::Write;
use tracing::debug;

use super::describe;
use crate::config::LsConfig;
use crate::utils::format::{write_gpus, OutputFormat};

/// List available GPUs
#[derive(Args, Debug, Default)]
pub struct LsArgs {
    /// Limit the number of the GPUs [default: 999]
    #[arg(long)]
    pub limit: Option<usize>,

    /// The minimum amount of free memory (in MB) [default: 0]
    #[arg(long)]
    pub mem_free_min: Option<f64>,

    /// The maximum amount of memory utilization [0, 100] [default: 100]
    #[arg(long)]
    pub mem_util_max: Option<f64>,

    /// The maximum amount of load [0, 100] [default: 100]
    #[arg(long)]
    pub gpu_util_max: Option<f64>,

    /// List of GPU IDs to exclude
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub exclude_ids: Vec<String>,

    /// List of GPU UUIDs to exclude
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub exclude_uuids: Vec<String>,

    /// Sort the GPUs using the specified attribute: id, gpu_util or mem_util [default: id]
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl LsArgs {
    /// Combine the flags with the configured defaults; flags win
    pub fn to_query(&self, defaults: &LsConfig) -> GpuQuery {
        let mut filter = defaults.filter.clone();
        if let Some(value) = self.gpu_util_max {
            filter.gpu_util_max = value;
        }
        if let Some(value) = self.mem_util_max {
            filter.mem_util_max = value;
        }
        if let Some(value) = self.mem_free_min {
            filter.mem_free_min = value;
        }
        if !self.exclude_ids.is_empty() {
            filter.exclude_ids = self.exclude_ids.iter().cloned().collect();
        }
        if !self.exclude_uuids.is_empty() {
            filter.exclude_uuids = self.exclude_uuids.iter().cloned().collect();
        }

        GpuQuery {
            filter,
            sort: self.sort.unwrap_or(defaults.sort),
            limit: Some(self.limit.unwrap_or(defaults.limit)),
        }
    }
}

pub fn execute<S: TelemetrySource>(
    args: LsArgs,
    nvsmi: &Nvsmi<S>,
    defaults: &LsConfig,
    out: &mut impl Write,
) -> Result<()> {
    let query = args.to_query(defaults);
    debug!("GPU query: {:?}", query);

    let gpus = nvsmi
        .available_gpus(&query)
        .map_err(|e| describe(e, "Failed to list GPUs"))?;
    write_gpus(out, &gpus, args.format)
}
