//! Positional parsing of `nvidia-smi --format=csv,noheader,nounits` output.
//!
//! Each non-blank line is one record whose fields are separated by `", "`.
//! The column order is fixed by [`GPU_QUERY_FIELDS`] and
//! [`PROCESS_QUERY_FIELDS`]; changing either means changing the parser too.

use tracing::debug;

use crate::correlate::CorrelationMap;
use crate::error::{QueryError, Result};
use crate::record::{Gpu, GpuFields, GpuProcess, UNKNOWN_GPU_INDEX};

/// Columns requested from `--query-gpu`, in parse order
pub const GPU_QUERY_FIELDS: [&str; 12] = [
    "index",
    "uuid",
    "utilization.gpu",
    "memory.total",
    "memory.used",
    "memory.free",
    "driver_version",
    "name",
    "gpu_serial",
    "display_active",
    "display_mode",
    "temperature.gpu",
];

/// Columns requested from `--query-compute-apps`, in parse order
pub const PROCESS_QUERY_FIELDS: [&str; 5] = [
    "pid",
    "process_name",
    "gpu_uuid",
    "gpu_name",
    "used_memory",
];

pub const FIELD_SEPARATOR: &str = ", ";

/// Parse a numeric field, mapping anything unparseable (such as `N/A`) to NaN.
///
/// NaN compares false against every number, which is what keeps GPUs with
/// unsupported metrics out of threshold filters.
pub fn to_f64_or_nan(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn split_fields<'a>(line: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let values: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if values.len() != expected {
        return Err(QueryError::MalformedRecord {
            expected,
            found: values.len(),
            line: line.to_string(),
        });
    }
    Ok(values)
}

/// Parse one line of `--query-gpu` output
pub fn parse_gpu_line(line: &str) -> Result<Gpu> {
    let values = split_fields(line, GPU_QUERY_FIELDS.len())?;

    Ok(Gpu::new(GpuFields {
        id: values[0].to_string(),
        uuid: values[1].to_string(),
        gpu_util: to_f64_or_nan(values[2]),
        mem_total: to_f64_or_nan(values[3]),
        mem_used: to_f64_or_nan(values[4]),
        mem_free: to_f64_or_nan(values[5]),
        driver: values[6].to_string(),
        name: values[7].to_string(),
        serial: values[8].to_string(),
        display_active: values[9].to_string(),
        display_mode: values[10].to_string(),
        temperature: to_f64_or_nan(values[11]),
    }))
}

/// Parse one line of `--query-compute-apps` output.
///
/// Without a map (or when the UUID is missing from it) the GPU index is
/// [`UNKNOWN_GPU_INDEX`].
pub fn parse_process_line(line: &str, gpu_map: Option<&CorrelationMap>) -> Result<GpuProcess> {
    let values = split_fields(line, PROCESS_QUERY_FIELDS.len())?;

    let pid = values[0]
        .parse::<u32>()
        .map_err(|_| QueryError::InvalidPid {
            value: values[0].to_string(),
            line: line.to_string(),
        })?;
    let gpu_uuid = values[2].to_string();
    let gpu_id = gpu_map
        .map(|map| map.index_of(&gpu_uuid))
        .unwrap_or(UNKNOWN_GPU_INDEX);

    Ok(GpuProcess {
        pid,
        process_name: values[1].to_string(),
        gpu_id,
        gpu_uuid,
        gpu_name: values[3].to_string(),
        used_memory: to_f64_or_nan(values[4]),
    })
}

fn records(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| !line.trim().is_empty())
}

/// Parse a whole `--query-gpu` block, skipping blank lines
pub fn parse_gpus(output: &str) -> Result<Vec<Gpu>> {
    let gpus = records(output)
        .map(parse_gpu_line)
        .collect::<Result<Vec<_>>>()?;
    debug!("Parsed {} GPU record(s)", gpus.len());
    Ok(gpus)
}

/// Parse a whole `--query-compute-apps` block, skipping blank lines
pub fn parse_processes(output: &str, gpu_map: Option<&CorrelationMap>) -> Result<Vec<GpuProcess>> {
    let processes = records(output)
        .map(|line| parse_process_line(line, gpu_map))
        .collect::<Result<Vec<_>>>()?;
    debug!("Parsed {} GPU process record(s)", processes.len());
    Ok(processes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const GPU_LINE: &str =
        "0, GPU-abc, 5, 8000, 2000, 6000, 450.1, Tesla, SN1, Enabled, Disabled, 60";

    #[test]
    fn test_to_f64_or_nan() {
        assert_eq!(to_f64_or_nan("42"), 42.0);
        assert_eq!(to_f64_or_nan("12.5"), 12.5);
        assert!(to_f64_or_nan("N/A").is_nan());
        assert!(to_f64_or_nan("[N/A]").is_nan());
        assert!(to_f64_or_nan("").is_nan());
    }

    #[test]
    fn test_nan_fails_comparisons() {
        let nan = to_f64_or_nan("N/A");
        assert!(!(nan <= 100.0));
        assert!(!(nan >= 0.0));
        assert!(!(nan <= f64::INFINITY));
        assert!(!(nan >= f64::NEG_INFINITY));
    }

    #[test]
    fn test_parse_gpu_line() {
        let gpu = parse_gpu_line(GPU_LINE).unwrap();
        assert_eq!(gpu.id(), "0");
        assert_eq!(gpu.uuid(), "GPU-abc");
        assert_eq!(gpu.gpu_util(), 5.0);
        assert_eq!(gpu.mem_total(), 8000.0);
        assert_eq!(gpu.mem_used(), 2000.0);
        assert_eq!(gpu.mem_free(), 6000.0);
        assert_eq!(gpu.mem_util(), 25.0);
        assert_eq!(gpu.driver(), "450.1");
        assert_eq!(gpu.name(), "Tesla");
        assert_eq!(gpu.serial(), "SN1");
        assert_eq!(gpu.display_active(), "Enabled");
        assert_eq!(gpu.display_mode(), "Disabled");
        assert_eq!(gpu.temperature(), 60.0);
    }

    #[test]
    fn test_parse_gpu_line_unsupported_metrics() {
        let line = "1, GPU-def, [N/A], 0, 0, 0, 450.1, GRID, [N/A], Disabled, Disabled, [N/A]";
        let gpu = parse_gpu_line(line).unwrap();
        assert!(gpu.gpu_util().is_nan());
        assert!(gpu.mem_util().is_nan());
        assert!(gpu.temperature().is_nan());
        assert_eq!(gpu.serial(), "[N/A]");
    }

    #[test]
    fn test_parse_gpu_line_wrong_field_count() {
        let err = parse_gpu_line("0, GPU-abc, 5").unwrap_err();
        match err {
            QueryError::MalformedRecord { expected, found, .. } => {
                assert_eq!(expected, 12);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_gpus_skips_blank_lines() {
        let output = format!("{GPU_LINE}\n  \n1, GPU-def, 90, 8000, 7600, 400, 450.1, Tesla, SN2, Disabled, Disabled, 80\n\n");
        let gpus = parse_gpus(&output).unwrap();
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[1].id(), "1");
        assert_eq!(gpus[1].mem_util(), 95.0);
    }

    #[test]
    fn test_parse_gpus_propagates_malformed_line() {
        let output = format!("{GPU_LINE}\nnot a record\n");
        assert!(parse_gpus(&output).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_process_line_without_map() {
        let proc = parse_process_line("1234, python, GPU-abc, Tesla, 512", None).unwrap();
        assert_eq!(proc.pid, 1234);
        assert_eq!(proc.process_name, "python");
        assert_eq!(proc.gpu_id, UNKNOWN_GPU_INDEX);
        assert_eq!(proc.gpu_uuid, "GPU-abc");
        assert_eq!(proc.gpu_name, "Tesla");
        assert_eq!(proc.used_memory, 512.0);
    }

    #[test]
    fn test_parse_process_line_with_map() {
        let map: CorrelationMap = [("GPU-abc", "0")].into_iter().collect();
        let proc = parse_process_line("1234, python, GPU-abc, Tesla, 512", Some(&map)).unwrap();
        assert_eq!(proc.gpu_id, 0);

        let empty = CorrelationMap::default();
        let proc = parse_process_line("1234, python, GPU-abc, Tesla, 512", Some(&empty)).unwrap();
        assert_eq!(proc.gpu_id, UNKNOWN_GPU_INDEX);
    }

    #[test]
    fn test_parse_process_line_invalid_pid() {
        let err = parse_process_line("abc, python, GPU-abc, Tesla, 512", None).unwrap_err();
        assert!(matches!(err, QueryError::InvalidPid { .. }));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_process_line_unavailable_memory() {
        let proc = parse_process_line("77, Xorg, GPU-abc, Tesla, [N/A]", None).unwrap();
        assert!(proc.used_memory.is_nan());
    }

    #[test]
    fn test_parse_processes_empty_output() {
        assert!(parse_processes("\n", None).unwrap().is_empty());
        assert!(parse_processes("", None).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_gpu_line_parse_is_deterministic(
            id in 0u32..16,
            util in 0u32..=100,
            total in 1u32..100_000,
            used_ratio in 0.0f64..=1.0,
        ) {
            let used = (total as f64 * used_ratio).floor();
            let free = total as f64 - used;
            let line = format!(
                "{id}, GPU-{id}, {util}, {total}, {used}, {free}, 535.54, NVIDIA A100, 132, Disabled, Disabled, 41"
            );
            let first = parse_gpu_line(&line).unwrap();
            let second = parse_gpu_line(&line).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.mem_util(), used / total as f64 * 100.0);
        }
    }
}
