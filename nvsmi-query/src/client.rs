use tracing::{debug, info};

use crate::correlate::{enrich_processes, CorrelationMap};
use crate::error::{QueryError, Result};
use crate::parser::{parse_gpus, parse_processes};
use crate::query::GpuQuery;
use crate::record::{Gpu, GpuProcess};
use crate::source::{NvidiaSmi, TelemetrySource};

/// High-level entry point: fetches from a [`TelemetrySource`] and parses.
///
/// Nothing is cached; every call queries the source again and returns fresh
/// records.
pub struct Nvsmi<S = NvidiaSmi> {
    source: S,
}

impl Nvsmi<NvidiaSmi> {
    /// Query the `nvidia-smi` found on `PATH`
    pub fn locate() -> Result<Self> {
        Ok(Self::new(NvidiaSmi::locate()?))
    }
}

impl<S: TelemetrySource> Nvsmi<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current GPU snapshot, in the order nvidia-smi lists them
    pub fn gpus(&self) -> Result<Vec<Gpu>> {
        let output = self.source.query_gpus()?;
        parse_gpus(&output)
    }

    /// GPUs passing `query`'s filter, sorted and limited
    pub fn available_gpus(&self, query: &GpuQuery) -> Result<Vec<Gpu>> {
        let gpus = self.gpus()?;
        info!(
            "Selecting GPUs (sort: {}, limit: {:?}) from {} listed",
            query.sort,
            query.limit,
            gpus.len()
        );
        Ok(query.apply(gpus))
    }

    /// UUID to index map built from a fresh GPU snapshot.
    ///
    /// This is a separate call to the source, so it may not match a listing
    /// obtained earlier. Use [`CorrelationMap::from_gpus`] to reuse one.
    pub fn correlation_map(&self) -> Result<CorrelationMap> {
        let map = self
            .gpus()
            .map(|gpus| CorrelationMap::from_gpus(&gpus))
            .map_err(|e| QueryError::CorrelationFailure(Box::new(e)))?;
        debug!("Correlation map covers {} GPU(s)", map.len());
        Ok(map)
    }

    /// Compute processes without GPU indices (all [`UNKNOWN_GPU_INDEX`](crate::UNKNOWN_GPU_INDEX))
    pub fn raw_processes(&self) -> Result<Vec<GpuProcess>> {
        let output = self.source.query_processes()?;
        parse_processes(&output, None)
    }

    /// Compute processes with indices resolved through `map`
    pub fn processes_with(&self, map: &CorrelationMap) -> Result<Vec<GpuProcess>> {
        let output = self.source.query_processes()?;
        parse_processes(&output, Some(map))
    }

    /// Compute processes with indices resolved through a fresh GPU snapshot.
    ///
    /// Fails with [`QueryError::CorrelationFailure`] if that snapshot fails;
    /// callers that would rather continue can combine [`Self::raw_processes`],
    /// [`Self::correlation_map`] and [`enrich_processes`] themselves.
    pub fn processes(&self) -> Result<Vec<GpuProcess>> {
        let processes = self.raw_processes()?;
        let map = self.correlation_map()?;
        Ok(enrich_processes(processes, &map))
    }
}
