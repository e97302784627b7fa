use anyhow::Result;
use clap::Args;
use nvsmi_query::{enrich_processes, CorrelationMap, Nvsmi, TelemetrySource};
use std::io::Write;
use tracing::warn;

use super::describe;
use crate::utils::format::{write_processes, OutputFormat};
use crate::utils::gpu_selector::select_processes;

/// Examine the processes of a GPU
#[derive(Args, Debug, Default)]
pub struct PsArgs {
    /// Show only the processes of the GPU matching the provided ids
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub ids: Vec<i64>,

    /// Show only the processes of the GPU matching the provided UUIDs (ignored with --ids)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub uuids: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub fn execute<S: TelemetrySource>(args: PsArgs, nvsmi: &Nvsmi<S>, out: &mut impl Write) -> Result<()> {
    let processes = nvsmi
        .raw_processes()
        .map_err(|e| describe(e, "Failed to list GPU processes"))?;

    // Without the map every process still prints, just with an unknown GPU index.
    let map = nvsmi.correlation_map().unwrap_or_else(|e| {
        warn!("{}; GPU indices will be reported as -1", e);
        CorrelationMap::default()
    });

    let processes = enrich_processes(processes, &map);
    let processes = select_processes(processes, &args.ids, &args.uuids);
    write_processes(out, &processes, args.format)
}
