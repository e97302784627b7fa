use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::Gpu;

/// Thresholds a GPU must meet to count as available.
///
/// Every criterion must hold. A GPU whose utilization is NaN (reported as
/// `N/A`) never satisfies the `<=` bounds and is therefore never available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuFilter {
    /// Maximum compute utilization (%)
    pub gpu_util_max: f64,
    /// Maximum memory utilization (%)
    pub mem_util_max: f64,
    /// Minimum free memory (MB)
    pub mem_free_min: f64,
    pub exclude_ids: HashSet<String>,
    pub exclude_uuids: HashSet<String>,
}

impl Default for GpuFilter {
    fn default() -> Self {
        Self {
            gpu_util_max: 100.0,
            mem_util_max: 100.0,
            mem_free_min: 0.0,
            exclude_ids: HashSet::new(),
            exclude_uuids: HashSet::new(),
        }
    }
}

impl GpuFilter {
    pub fn is_available(&self, gpu: &Gpu) -> bool {
        gpu.gpu_util() <= self.gpu_util_max
            && gpu.mem_util() <= self.mem_util_max
            && gpu.mem_free() >= self.mem_free_min
            && !self.exclude_ids.contains(gpu.id())
            && !self.exclude_uuids.contains(gpu.uuid())
    }
}

/// Keep the GPUs that pass `filter`, preserving their order
pub fn filter_available(gpus: Vec<Gpu>, filter: &GpuFilter) -> Vec<Gpu> {
    let total = gpus.len();
    let available: Vec<Gpu> = gpus.into_iter().filter(|gpu| filter.is_available(gpu)).collect();
    debug!("{} of {} GPU(s) available", available.len(), total);
    available
}

/// Attribute used to order GPU listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    #[serde(alias = "index")]
    Id,
    GpuUtil,
    MemUtil,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::GpuUtil => "gpu_util",
            SortKey::MemUtil => "mem_util",
        }
    }

    fn compare(&self, a: &Gpu, b: &Gpu) -> Ordering {
        match self {
            SortKey::Id => compare_ids(a.id(), b.id()),
            SortKey::GpuUtil => compare_nan_last(a.gpu_util(), b.gpu_util()),
            SortKey::MemUtil => compare_nan_last(a.mem_util(), b.mem_util()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" | "index" => Ok(SortKey::Id),
            "gpu_util" => Ok(SortKey::GpuUtil),
            "mem_util" => Ok(SortKey::MemUtil),
            _ => Err(format!(
                "Unknown sort key '{}' (expected id, gpu_util or mem_util)",
                s
            )),
        }
    }
}

// Numeric indices come first in numeric order ("2" before "10"), then every
// other id in string order. Equal numbers fall back to the raw text so the
// order stays total.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn compare_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

/// Stable ascending sort by `key`, then keep at most `limit` GPUs
pub fn sort_and_limit(mut gpus: Vec<Gpu>, key: SortKey, limit: usize) -> Vec<Gpu> {
    gpus.sort_by(|a, b| key.compare(a, b));
    gpus.truncate(limit);
    gpus
}

/// Full listing query: filter, then sort, then limit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpuQuery {
    pub filter: GpuFilter,
    pub sort: SortKey,
    /// `None` keeps every GPU that passes the filter
    pub limit: Option<usize>,
}

impl GpuQuery {
    pub fn apply(&self, gpus: Vec<Gpu>) -> Vec<Gpu> {
        let available = filter_available(gpus, &self.filter);
        sort_and_limit(available, self.sort, self.limit.unwrap_or(usize::MAX))
    }
}
