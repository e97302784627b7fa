use std::fmt;

use serde::Serialize;

/// `gpu_id` of a process whose GPU UUID could not be matched to an index
pub const UNKNOWN_GPU_INDEX: i64 = -1;

/// One GPU as reported by a single `nvidia-smi --query-gpu` call.
///
/// Numeric fields that nvidia-smi reports as `N/A` hold `f64::NAN`. NaN fails
/// every `<=`/`>=` comparison, so such a GPU never passes an availability
/// threshold.
///
/// The record is read-only once built: [`Gpu::new`] is the only constructor
/// and the memory utilization always agrees with `mem_used`/`mem_total`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gpu {
    id: String,
    uuid: String,
    gpu_util: f64,
    mem_util: f64,
    mem_total: f64,
    mem_used: f64,
    mem_free: f64,
    driver: String,
    name: String,
    serial: String,
    display_active: String,
    display_mode: String,
    temperature: f64,
}

/// Fields of a [`Gpu`] exactly as they come out of the line parser.
#[derive(Debug, Clone)]
pub struct GpuFields {
    pub id: String,
    pub uuid: String,
    pub gpu_util: f64,
    pub mem_total: f64,
    pub mem_used: f64,
    pub mem_free: f64,
    pub driver: String,
    pub name: String,
    pub serial: String,
    pub display_active: String,
    pub display_mode: String,
    pub temperature: f64,
}

impl Gpu {
    /// Build a record, computing the memory utilization from used/total
    pub fn new(fields: GpuFields) -> Self {
        let mem_util = memory_utilization(fields.mem_used, fields.mem_total);
        Self {
            id: fields.id,
            uuid: fields.uuid,
            gpu_util: fields.gpu_util,
            mem_util,
            mem_total: fields.mem_total,
            mem_used: fields.mem_used,
            mem_free: fields.mem_free,
            driver: fields.driver,
            name: fields.name,
            serial: fields.serial,
            display_active: fields.display_active,
            display_mode: fields.display_mode,
            temperature: fields.temperature,
        }
    }

    /// Index assigned by the driver, kept as reported
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Compute utilization (%)
    pub fn gpu_util(&self) -> f64 {
        self.gpu_util
    }

    /// `mem_used / mem_total * 100`, never read from the source
    pub fn mem_util(&self) -> f64 {
        self.mem_util
    }

    /// MB
    pub fn mem_total(&self) -> f64 {
        self.mem_total
    }

    /// MB
    pub fn mem_used(&self) -> f64 {
        self.mem_used
    }

    /// MB
    pub fn mem_free(&self) -> f64 {
        self.mem_free
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn display_active(&self) -> &str {
        &self.display_active
    }

    pub fn display_mode(&self) -> &str {
        &self.display_mode
    }

    /// Celsius
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// `used / total * 100`, or NaN when the total is zero or unknown
pub fn memory_utilization(used: f64, total: f64) -> f64 {
    if total == 0.0 || total.is_nan() {
        return f64::NAN;
    }
    used / total * 100.0
}

/// One compute process holding memory on a GPU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuProcess {
    pub pid: u32,
    pub process_name: String,
    /// Index of the GPU, or [`UNKNOWN_GPU_INDEX`] until correlated
    pub gpu_id: i64,
    pub gpu_uuid: String,
    pub gpu_name: String,
    /// MB, NaN when unavailable
    pub used_memory: f64,
}

impl GpuProcess {
    pub fn has_known_gpu(&self) -> bool {
        self.gpu_id != UNKNOWN_GPU_INDEX
    }
}

fn write_json<T: Serialize>(f: &mut fmt::Formatter<'_>, value: &T) -> fmt::Result {
    let json = serde_json::to_string(value).map_err(|_| fmt::Error)?;
    f.write_str(&json)
}

impl fmt::Display for Gpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_json(f, self)
    }
}

impl fmt::Display for GpuProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_json(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(mem_total: f64, mem_used: f64) -> GpuFields {
        GpuFields {
            id: "0".to_string(),
            uuid: "GPU-abc".to_string(),
            gpu_util: 5.0,
            mem_total,
            mem_used,
            mem_free: mem_total - mem_used,
            driver: "450.1".to_string(),
            name: "Tesla".to_string(),
            serial: "SN1".to_string(),
            display_active: "Enabled".to_string(),
            display_mode: "Disabled".to_string(),
            temperature: 60.0,
        }
    }

    #[test]
    fn test_memory_utilization_is_derived() {
        let gpu = Gpu::new(fields(8000.0, 2000.0));
        assert_eq!(gpu.mem_util(), 25.0);
    }

    #[test]
    fn test_memory_utilization_follows_used_and_total() {
        let gpu = Gpu::new(fields(1.0, 1.0));
        assert_eq!(gpu.mem_used(), 1.0);
        assert_eq!(gpu.mem_total(), 1.0);
        assert_eq!(gpu.mem_util(), 100.0);
        assert_eq!(gpu.mem_util(), memory_utilization(gpu.mem_used(), gpu.mem_total()));
    }

    #[test]
    fn test_memory_utilization_zero_total() {
        let gpu = Gpu::new(fields(0.0, 0.0));
        assert!(gpu.mem_util().is_nan());
    }

    #[test]
    fn test_memory_utilization_unknown_inputs() {
        assert!(memory_utilization(100.0, f64::NAN).is_nan());
        assert!(memory_utilization(f64::NAN, 100.0).is_nan());
    }

    #[test]
    fn test_display_is_json() {
        let gpu = Gpu::new(fields(8000.0, 2000.0));
        let value: serde_json::Value = serde_json::from_str(&gpu.to_string()).unwrap();
        assert_eq!(value["id"], "0");
        assert_eq!(value["mem_util"], 25.0);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let proc = GpuProcess {
            pid: 1,
            process_name: "python".to_string(),
            gpu_id: UNKNOWN_GPU_INDEX,
            gpu_uuid: "GPU-abc".to_string(),
            gpu_name: "Tesla".to_string(),
            used_memory: f64::NAN,
        };
        let value: serde_json::Value = serde_json::from_str(&proc.to_string()).unwrap();
        assert!(value["used_memory"].is_null());
        assert_eq!(value["gpu_id"], -1);
        assert!(!proc.has_known_gpu());
    }
}
