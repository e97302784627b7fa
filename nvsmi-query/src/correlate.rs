//! Mapping GPU UUIDs to indices.
//!
//! `--query-compute-apps` only reports the UUID of the GPU a process runs on,
//! so the index is recovered from a separate `--query-gpu` snapshot. The two
//! calls are not atomic: a GPU that appears or disappears in between simply
//! leaves its processes with [`UNKNOWN_GPU_INDEX`].

use std::collections::HashMap;

use tracing::warn;

use crate::record::{Gpu, GpuProcess, UNKNOWN_GPU_INDEX};

/// GPU UUID to GPU index, as reported by nvidia-smi
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationMap {
    inner: HashMap<String, String>,
}

impl CorrelationMap {
    /// Build the map from a snapshot the caller already holds
    pub fn from_gpus(gpus: &[Gpu]) -> Self {
        gpus.iter()
            .map(|gpu| (gpu.uuid().to_string(), gpu.id().to_string()))
            .collect()
    }

    /// Index string recorded for `uuid`
    pub fn get(&self, uuid: &str) -> Option<&str> {
        self.inner.get(uuid).map(String::as_str)
    }

    /// Numeric index for `uuid`, [`UNKNOWN_GPU_INDEX`] on a miss
    pub fn index_of(&self, uuid: &str) -> i64 {
        match self.get(uuid) {
            Some(id) => id.parse::<i64>().unwrap_or_else(|_| {
                warn!("GPU {} has non-numeric index {:?}", uuid, id);
                UNKNOWN_GPU_INDEX
            }),
            None => UNKNOWN_GPU_INDEX,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CorrelationMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(uuid, id)| (uuid.into(), id.into()))
                .collect(),
        }
    }
}

/// Fill in `gpu_id` on each process from its UUID
pub fn enrich_processes(processes: Vec<GpuProcess>, map: &CorrelationMap) -> Vec<GpuProcess> {
    processes
        .into_iter()
        .map(|mut proc| {
            proc.gpu_id = map.index_of(&proc.gpu_uuid);
            proc
        })
        .collect()
}
